use crate::config::EyepiConfig;
use crate::error::{EyepiError, Result};
use chrono::{DateTime, Local, Utc};
use chrono_tz::Tz;
use image::{DynamicImage, ImageFormat, Rgba};
use imageproc::drawing::{draw_text_mut, text_size};
use rusttype::{Font, Scale};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

const OVERLAY_FORMAT: &str = "%a %b %e %H:%M:%S %Z %Y";
const MARGIN: u32 = 50;

/// Font and timezone used to stamp `last_image.jpg`
#[derive(Debug, Clone)]
pub struct OverlayStyle {
    pub font_path: PathBuf,
    pub font_size: f32,
    pub timezone: Option<Tz>,
}

impl OverlayStyle {
    pub fn from_config(config: &EyepiConfig) -> Self {
        Self {
            font_path: PathBuf::from(&config.timestamp_font_path),
            font_size: config.timestamp_font_size,
            timezone: config
                .timestamp_timezone
                .as_deref()
                .and_then(resolve_timestamp_timezone),
        }
    }

    fn render_now(&self) -> String {
        let now = Utc::now();
        match self.timezone {
            Some(tz) => now.with_timezone(&tz).format(OVERLAY_FORMAT).to_string(),
            None => DateTime::<Local>::from(now).format(OVERLAY_FORMAT).to_string(),
        }
    }
}

fn resolve_timestamp_timezone(tz_name: &str) -> Option<Tz> {
    match tz_name.parse::<Tz>() {
        Ok(tz) => Some(tz),
        Err(_) => {
            warn!("Invalid timestamp timezone '{}', using local time", tz_name);
            None
        }
    }
}

/// Draw the current time in the bottom-left corner of the image at `source`
/// and write the result to `dest` as JPEG. Blocking; run it off the runtime.
pub fn annotate_timestamp(source: &Path, dest: &Path, style: &OverlayStyle) -> Result<()> {
    let mut img = image::open(source)?.to_rgba8();

    let font_data = std::fs::read(&style.font_path).map_err(|e| {
        EyepiError::system(format!(
            "Failed to read font file '{}': {}",
            style.font_path.display(),
            e
        ))
    })?;
    let font = Font::try_from_vec(font_data).ok_or_else(|| {
        EyepiError::system(format!(
            "Failed to parse font file '{}'",
            style.font_path.display()
        ))
    })?;

    let text = style.render_now();
    let scale = Scale::uniform(style.font_size);
    let (_, text_height) = text_size(scale, &font, &text);
    let x = MARGIN;
    let y = img
        .height()
        .saturating_sub(MARGIN + text_height.max(0) as u32);

    draw_text_mut(
        &mut img,
        Rgba([255, 0, 0, 255]),
        x as i32,
        y as i32,
        scale,
        &font,
        &text,
    );

    DynamicImage::ImageRgba8(img)
        .to_rgb8()
        .save_with_format(dest, ImageFormat::Jpeg)?;

    debug!(
        "Stamped '{}' onto {} (font: {}, size: {})",
        text,
        dest.display(),
        style.font_path.display(),
        style.font_size
    );
    Ok(())
}
