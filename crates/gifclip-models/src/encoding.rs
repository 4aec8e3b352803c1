//! Encoding configuration for the intermediate video and the GIF output.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Intermediate video codec (H.264)
pub const DEFAULT_VIDEO_CODEC: &str = "libx264";
/// Intermediate encoding preset
pub const DEFAULT_PRESET: &str = "veryfast";
/// Intermediate CRF, low enough to be visually lossless before palette quantization
pub const DEFAULT_CRF: u8 = 18;
/// Intermediate pixel format
pub const DEFAULT_PIXEL_FORMAT: &str = "yuv420p";

/// GIF output frame rate
pub const GIF_FRAME_RATE: u32 = 15;
/// GIF output width (height follows the source aspect ratio)
pub const GIF_OUTPUT_WIDTH: u32 = 320;
/// GIF loop count (0 = loop forever)
pub const GIF_LOOP_FOREVER: i32 = 0;
/// Scaler used when downsampling to the GIF width
pub const GIF_SCALE_FLAGS: &str = "lanczos";

/// Default maximum rendered clip length in seconds
pub const DEFAULT_MAX_CLIP_SECONDS: f64 = 3.0;
/// Default number of highlights per request
pub const DEFAULT_CLIP_COUNT: usize = 3;

/// Caption reference font size in pixels
pub const CAPTION_BASE_FONT_SIZE: u32 = 30;
/// Captions wrap to this fraction of the frame width
pub const CAPTION_WIDTH_RATIO: f64 = 0.7;
/// Caption outline width in pixels
pub const CAPTION_STROKE_WIDTH: u32 = 2;
/// Backing plate padding per side (horizontal)
pub const PLATE_PADDING_X: u32 = 20;
/// Backing plate padding per side (vertical)
pub const PLATE_PADDING_Y: u32 = 10;
/// Backing plate opacity
pub const PLATE_OPACITY: f32 = 0.6;

/// Rounds frame dimensions down to even values; yuv420p H.264 requires them.
pub const EVEN_DIMENSIONS_FILTER: &str = "scale=trunc(iw/2)*2:trunc(ih/2)*2";

/// Intermediate (pre-palette) encoding configuration.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct IntermediateEncodingConfig {
    /// Video codec (e.g., "libx264")
    #[serde(default = "default_video_codec")]
    pub codec: String,

    /// Encoding preset (e.g., "veryfast", "medium")
    #[serde(default = "default_preset")]
    pub preset: String,

    /// Constant Rate Factor (quality, 0-51, lower is better)
    #[serde(default = "default_crf")]
    pub crf: u8,

    /// Output pixel format
    #[serde(default = "default_pixel_format")]
    pub pixel_format: String,
}

fn default_video_codec() -> String {
    DEFAULT_VIDEO_CODEC.to_string()
}
fn default_preset() -> String {
    DEFAULT_PRESET.to_string()
}
fn default_crf() -> u8 {
    DEFAULT_CRF
}
fn default_pixel_format() -> String {
    DEFAULT_PIXEL_FORMAT.to_string()
}

impl Default for IntermediateEncodingConfig {
    fn default() -> Self {
        Self {
            codec: DEFAULT_VIDEO_CODEC.to_string(),
            preset: DEFAULT_PRESET.to_string(),
            crf: DEFAULT_CRF,
            pixel_format: DEFAULT_PIXEL_FORMAT.to_string(),
        }
    }
}

impl IntermediateEncodingConfig {
    /// Convert to FFmpeg output arguments. Audio is always dropped.
    pub fn to_ffmpeg_args(&self) -> Vec<String> {
        vec![
            "-c:v".to_string(),
            self.codec.clone(),
            "-preset".to_string(),
            self.preset.clone(),
            "-crf".to_string(),
            self.crf.to_string(),
            "-pix_fmt".to_string(),
            self.pixel_format.clone(),
            "-an".to_string(),
        ]
    }

    /// Video filter chain for the intermediate pass: even dimensions first,
    /// then the optional overlay.
    pub fn video_filter(&self, overlay: Option<&str>) -> String {
        match overlay {
            Some(overlay) if !overlay.is_empty() => format!("{EVEN_DIMENSIONS_FILTER},{overlay}"),
            _ => EVEN_DIMENSIONS_FILTER.to_string(),
        }
    }
}

/// Palette-based GIF encoding configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct GifEncodingConfig {
    pub frame_rate: u32,
    pub width: u32,
    pub loop_count: i32,
    pub scale_flags: String,
}

impl Default for GifEncodingConfig {
    fn default() -> Self {
        Self {
            frame_rate: GIF_FRAME_RATE,
            width: GIF_OUTPUT_WIDTH,
            loop_count: GIF_LOOP_FOREVER,
            scale_flags: GIF_SCALE_FLAGS.to_string(),
        }
    }
}

impl GifEncodingConfig {
    /// Filter graph: downsample, build a palette from the whole clip, then
    /// re-encode every frame against that palette.
    pub fn to_filter(&self) -> String {
        format!(
            "fps={fps},scale={width}:-1:flags={flags},split[s0][s1];[s0]palettegen[p];[s1][p]paletteuse",
            fps = self.frame_rate,
            width = self.width,
            flags = self.scale_flags,
        )
    }

    /// Output height for a source of the given size, matching `scale=W:-1`.
    pub fn output_height(&self, src_width: u32, src_height: u32) -> u32 {
        if src_width == 0 || src_height == 0 {
            return 0;
        }
        (f64::from(self.width) * f64::from(src_height) / f64::from(src_width)).round() as u32
    }
}

/// Caption overlay styling.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct CaptionStyle {
    /// Reference font size; longer captions step down from it
    pub base_font_size: u32,
    /// Fontconfig font name used when no font file is set
    pub font: String,
    /// Optional path to a TTF/OTF file (takes precedence over `font`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub font_file: Option<String>,
    pub fill_color: String,
    pub stroke_color: String,
    pub stroke_width: u32,
    /// Wrap width as a fraction of the frame width
    pub width_ratio: f64,
    pub plate_color: String,
    pub plate_opacity: f32,
    pub plate_padding_x: u32,
    pub plate_padding_y: u32,
}

impl Default for CaptionStyle {
    fn default() -> Self {
        Self {
            base_font_size: CAPTION_BASE_FONT_SIZE,
            font: "Sans".to_string(),
            font_file: None,
            fill_color: "white".to_string(),
            stroke_color: "black".to_string(),
            stroke_width: CAPTION_STROKE_WIDTH,
            width_ratio: CAPTION_WIDTH_RATIO,
            plate_color: "black".to_string(),
            plate_opacity: PLATE_OPACITY,
            plate_padding_x: PLATE_PADDING_X,
            plate_padding_y: PLATE_PADDING_Y,
        }
    }
}
