const DEFAULT_BRIGHTNESS: i32 = 50;
const DEFAULT_MODE: i32 = 0;
const DEFAULT_QUALITY: i32 = 75;

/// Output encodings raspistill can produce natively
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Encoding {
    #[default]
    Jpg,
    Bmp,
    Gif,
    Png,
}

impl Encoding {
    pub fn as_str(&self) -> &'static str {
        match self {
            Encoding::Jpg => "jpg",
            Encoding::Bmp => "bmp",
            Encoding::Gif => "gif",
            Encoding::Png => "png",
        }
    }
}

/// Camera settings passed to raspistill. Only values that differ from the
/// tool's own defaults are emitted as flags.
#[derive(Debug, Clone, PartialEq)]
pub struct RaspistillArgs {
    pub encoding: Encoding,
    pub horizontal_flip: bool,
    pub vertical_flip: bool,
    pub width: u32,
    pub height: u32,
    /// -100..=100
    pub sharpness: i32,
    /// -100..=100
    pub contrast: i32,
    /// 0..=100
    pub brightness: i32,
    /// -100..=100
    pub saturation: i32,
    /// 100..=800
    pub iso: u32,
    /// -10..=10
    pub ev: i32,
    /// JPEG quality 0..=100
    pub quality: i32,
    pub mode: i32,
    /// Microseconds, max 6000000
    pub shutter_speed: u32,
    /// 0, 90, 180 or 270
    pub rotation: u32,
    pub annotate: Option<String>,
    pub annotate_extra: Option<String>,
}

impl Default for RaspistillArgs {
    fn default() -> Self {
        Self {
            encoding: Encoding::Jpg,
            horizontal_flip: false,
            vertical_flip: false,
            width: 0,
            height: 0,
            sharpness: 0,
            contrast: 0,
            brightness: DEFAULT_BRIGHTNESS,
            saturation: 0,
            iso: 0,
            ev: 0,
            quality: DEFAULT_QUALITY,
            mode: DEFAULT_MODE,
            shutter_speed: 0,
            rotation: 0,
            annotate: None,
            annotate_extra: None,
        }
    }
}

impl RaspistillArgs {
    pub fn with_encoding(mut self, encoding: Encoding) -> Self {
        self.encoding = encoding;
        self
    }

    pub fn with_quality(mut self, quality: i32) -> Self {
        self.quality = quality;
        self
    }

    /// Command-line arguments writing a single still to stdout
    pub fn to_args(&self) -> Vec<String> {
        let mut args: Vec<String> = vec!["-t".into(), "5".into()];
        let mut flag = |name: &str, value: String| {
            args.push(name.to_string());
            args.push(value);
        };

        if self.width != 0 {
            flag("-w", self.width.to_string());
        }
        if self.height != 0 {
            flag("-h", self.height.to_string());
        }
        if self.sharpness != 0 {
            flag("-sh", self.sharpness.to_string());
        }
        if self.contrast != 0 {
            flag("-co", self.contrast.to_string());
        }
        if self.brightness != DEFAULT_BRIGHTNESS {
            flag("-br", self.brightness.to_string());
        }
        if self.encoding != Encoding::Jpg {
            flag("-e", self.encoding.as_str().to_string());
        }
        if self.saturation != 0 {
            flag("-sa", self.saturation.to_string());
        }
        if self.iso != 0 {
            flag("-ISO", self.iso.to_string());
        }
        if self.ev != 0 {
            flag("-ev", self.ev.to_string());
        }
        if self.rotation != 0 {
            flag("-rot", self.rotation.to_string());
        }
        if self.shutter_speed != 0 {
            flag("-ss", self.shutter_speed.to_string());
        }
        if self.mode != DEFAULT_MODE {
            flag("-md", self.mode.to_string());
        }
        if let Some(extra) = &self.annotate_extra {
            flag("-ae", extra.clone());
        }
        if let Some(annotate) = &self.annotate {
            flag("-a", annotate.clone());
        }
        if self.quality != DEFAULT_QUALITY && self.encoding == Encoding::Jpg {
            flag("-q", self.quality.to_string());
        }

        if self.horizontal_flip {
            args.push("-hf".into());
        }
        if self.vertical_flip {
            args.push("-vf".into());
        }

        args.push("-o".into());
        args.push("-".into());
        args
    }
}
