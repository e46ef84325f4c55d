//! InfluxDB line protocol encoding
//!
//! `<measurement>[,<tag>=<value>...] <field>=<value>[,...] <unix-nanos>`

use crate::error::{EyepiError, Result};
use crate::scheduler::Measurement;
use std::fmt::Write;
use std::time::UNIX_EPOCH;

/// Escape a measurement name: commas and spaces
pub fn escape_measurement(name: &str) -> String {
    escape(name, &[',', ' '])
}

/// Escape a tag key, tag value or field key: commas, equals signs and spaces
pub fn escape_tag(value: &str) -> String {
    escape(value, &[',', '=', ' '])
}

fn escape(input: &str, special: &[char]) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        if special.contains(&c) {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

/// Encode one measurement as a newline-terminated line. Non-finite field
/// values are skipped; a measurement left without fields is an error.
pub fn encode_line(measurement: &Measurement) -> Result<String> {
    if measurement.name.is_empty() {
        return Err(EyepiError::metrics("measurement name is empty"));
    }

    let mut line = escape_measurement(&measurement.name);
    for (key, value) in &measurement.tags {
        if key.is_empty() || value.is_empty() {
            continue;
        }
        let _ = write!(line, ",{}={}", escape_tag(key), escape_tag(value));
    }

    let fields: Vec<String> = measurement
        .fields
        .iter()
        .filter(|(_, value)| value.is_finite())
        .map(|(key, value)| format!("{}={}", escape_tag(key), value))
        .collect();
    if fields.is_empty() {
        return Err(EyepiError::metrics(format!(
            "measurement {} has no valid fields",
            measurement.name
        )));
    }
    line.push(' ');
    line.push_str(&fields.join(","));

    if let Ok(since_epoch) = measurement.timestamp.duration_since(UNIX_EPOCH) {
        let _ = write!(line, " {}", since_epoch.as_nanos());
    }
    line.push('\n');

    Ok(line)
}
