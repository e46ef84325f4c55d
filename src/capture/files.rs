use super::overlay::{annotate_timestamp, OverlayStyle};
use crate::config::ImageType;
use crate::error::{EyepiError, Result};
use image::ImageFormat;
use std::io::Cursor;
use std::path::Path;

/// Copy `source` over `dest`, creating it if needed
pub async fn copy_file(source: &Path, dest: &Path) -> Result<()> {
    tokio::fs::copy(source, dest).await?;
    Ok(())
}

/// Re-encode a BMP still as TIFF
pub fn convert_to_tiff(bmp: &[u8]) -> Result<Vec<u8>> {
    let image = image::load_from_memory_with_format(bmp, ImageFormat::Bmp)?;
    let mut output = Vec::new();
    image.write_to(&mut Cursor::new(&mut output), ImageFormat::Tiff)?;
    Ok(output)
}

/// Refresh the `last_image` file from a freshly written capture: JPEGs are
/// timestamp-annotated, other formats are copied as-is.
pub async fn update_last_image(
    primary: &Path,
    last: &Path,
    image_type: ImageType,
    style: &OverlayStyle,
) -> Result<()> {
    if image_type != ImageType::Jpg {
        return copy_file(primary, last).await;
    }

    let primary = primary.to_path_buf();
    let last = last.to_path_buf();
    let style = style.clone();
    tokio::task::spawn_blocking(move || annotate_timestamp(&primary, &last, &style))
        .await
        .map_err(|e| EyepiError::system(format!("Timestamp overlay task failed: {}", e)))?
}
