use std::collections::BTreeMap;
use std::path::Path;

/// Parse `KEY=VALUE` lines from a sysfs `uevent` descriptor.
///
/// A line without a separator ends parsing; whatever was read before it is
/// returned.
pub fn parse_uevent(contents: &str) -> BTreeMap<String, String> {
    let mut env = BTreeMap::new();
    for line in contents.lines() {
        match line.split_once('=') {
            Some((key, value)) => {
                env.insert(key.to_string(), value.to_string());
            }
            None => break,
        }
    }
    env
}

pub fn read_uevent_file(path: &Path) -> std::io::Result<BTreeMap<String, String>> {
    let contents = std::fs::read_to_string(path)?;
    Ok(parse_uevent(&contents))
}
