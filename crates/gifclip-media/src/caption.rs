//! Caption overlay layout and drawtext filter generation.
//!
//! Captions are burned in at source resolution, before the GIF downscale:
//! a semi-transparent plate anchored to the bottom edge, with the wrapped
//! text centered on top of it.

use gifclip_models::CaptionStyle;

/// Frame width assumed when the source could not be probed.
pub const FALLBACK_FRAME_WIDTH: u32 = 640;

/// Average glyph advance as a fraction of the font size.
const GLYPH_WIDTH_RATIO: f64 = 0.55;

/// Line height as a fraction of the font size.
const LINE_HEIGHT_RATIO: f64 = 1.2;

/// Font size for a caption: long captions step down from `base`.
///
/// Over 50 characters uses `base - 5`, over 30 uses `base - 3`.
pub fn caption_font_size(text: &str, base: u32) -> u32 {
    let len = text.chars().count();
    if len > 50 {
        base.saturating_sub(5).max(1)
    } else if len > 30 {
        base.saturating_sub(3).max(1)
    } else {
        base
    }
}

/// Greedy word wrap to at most `max_chars` characters per line.
///
/// Words longer than a line are split.
pub fn wrap_caption(text: &str, max_chars: usize) -> Vec<String> {
    let max_chars = max_chars.max(1);
    let mut lines = Vec::new();
    let mut current = String::new();
    let mut current_len = 0usize;

    for word in text.split_whitespace() {
        let mut word: Vec<char> = word.chars().collect();

        while word.len() > max_chars {
            if current_len > 0 {
                lines.push(std::mem::take(&mut current));
                current_len = 0;
            }
            let rest = word.split_off(max_chars);
            lines.push(word.into_iter().collect());
            word = rest;
        }

        let word_len = word.len();
        if word_len == 0 {
            continue;
        }

        if current_len == 0 {
            current.extend(word);
            current_len = word_len;
        } else if current_len + 1 + word_len <= max_chars {
            current.push(' ');
            current.extend(word);
            current_len += 1 + word_len;
        } else {
            lines.push(std::mem::replace(&mut current, word.into_iter().collect()));
            current_len = word_len;
        }
    }

    if current_len > 0 {
        lines.push(current);
    }

    lines
}

/// Computed geometry of a caption for a given frame width.
#[derive(Debug, Clone, PartialEq)]
pub struct CaptionLayout {
    pub lines: Vec<String>,
    pub font_size: u32,
    pub line_height: u32,
    pub text_width: u32,
    pub text_height: u32,
    pub plate_width: u32,
    pub plate_height: u32,
}

impl CaptionLayout {
    /// Lay out `text` for a frame `frame_width` pixels wide.
    pub fn compute(text: &str, style: &CaptionStyle, frame_width: Option<u32>) -> Self {
        let text = text.trim();
        let frame_width = frame_width.filter(|w| *w > 0).unwrap_or(FALLBACK_FRAME_WIDTH);
        let font_size = caption_font_size(text, style.base_font_size);

        let glyph_width = f64::from(font_size) * GLYPH_WIDTH_RATIO;
        let max_width = f64::from(frame_width) * style.width_ratio;
        let max_chars = (max_width / glyph_width).floor().max(1.0) as usize;

        let lines = wrap_caption(text, max_chars);
        let line_height = (f64::from(font_size) * LINE_HEIGHT_RATIO).round() as u32;

        if lines.is_empty() {
            return Self {
                lines,
                font_size,
                line_height,
                text_width: 0,
                text_height: 0,
                plate_width: 0,
                plate_height: 0,
            };
        }

        let widest = lines.iter().map(|l| l.chars().count()).max().unwrap_or(0);
        let text_width = (widest as f64 * glyph_width).ceil() as u32;
        let text_height = line_height * lines.len() as u32;

        Self {
            font_size,
            line_height,
            text_width,
            text_height,
            plate_width: text_width + 2 * style.plate_padding_x,
            plate_height: text_height + 2 * style.plate_padding_y,
            lines,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Filter chain drawing the plate and text, or `None` for an empty caption.
    pub fn to_filter(&self, style: &CaptionStyle) -> Option<String> {
        if self.is_empty() {
            return None;
        }

        let mut filters = Vec::with_capacity(self.lines.len() + 1);
        filters.push(format!(
            "drawbox=x=(iw-{pw})/2:y=ih-{ph}:w={pw}:h={ph}:color={color}@{opacity}:t=fill",
            pw = self.plate_width,
            ph = self.plate_height,
            color = style.plate_color,
            opacity = style.plate_opacity,
        ));

        let font = match &style.font_file {
            Some(file) => format!("fontfile={}", escape_filter_text(file)),
            None => format!("font={}", escape_filter_text(&style.font)),
        };

        for (i, line) in self.lines.iter().enumerate() {
            // Distance from the bottom edge to the top of this line
            let offset = self.plate_height - style.plate_padding_y - i as u32 * self.line_height;
            filters.push(format!(
                "drawtext={font}:expansion=none:text={text}:fontsize={size}:fontcolor={fill}:borderw={stroke}:bordercolor={stroke_color}:x=(w-text_w)/2:y=h-{offset}",
                text = escape_filter_text(line),
                size = self.font_size,
                fill = style.fill_color,
                stroke = style.stroke_width,
                stroke_color = style.stroke_color,
            ));
        }

        Some(filters.join(","))
    }
}

/// Escape a value for use inside a filter option within a filtergraph.
///
/// Option values treat `\ ' :` as special; the filtergraph parser then
/// treats `\ ' [ ] , ;` as special, so both levels are applied in order.
pub fn escape_filter_text(value: &str) -> String {
    let mut level1 = String::with_capacity(value.len());
    for c in value.chars() {
        if matches!(c, '\\' | '\'' | ':') {
            level1.push('\\');
        }
        level1.push(c);
    }

    let mut level2 = String::with_capacity(level1.len());
    for c in level1.chars() {
        if matches!(c, '\\' | '\'' | '[' | ']' | ',' | ';') {
            level2.push('\\');
        }
        level2.push(c);
    }
    level2
}
