use std::io::Cursor;

use image::codecs::jpeg::JpegEncoder;
use image::{DynamicImage, ImageFormat};
use serde::Deserialize;

use inkrelay_shared::{decode_frame, ServerMessage, Stroke, Tool, WireFrame};

use crate::config::DEFAULT_COLOR;
use crate::error::ExportError;
use crate::geometry::{clamp_width, smooth_path};
use crate::raster::rasterize;
use crate::render::{Layer, Viewport};

pub const VECTOR_MIME: &str = "image/svg+xml";
pub const DEFAULT_JPEG_QUALITY: f32 = 0.92;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RasterFormat {
    Png,
    Jpeg,
}

impl RasterFormat {
    /// `jpeg` and `jpg` select JPEG; every other name falls back to PNG.
    pub fn from_name(name: &str) -> Self {
        match name.trim().to_ascii_lowercase().as_str() {
            "jpeg" | "jpg" => RasterFormat::Jpeg,
            _ => RasterFormat::Png,
        }
    }

    pub fn mime_type(self) -> &'static str {
        match self {
            RasterFormat::Png => "image/png",
            RasterFormat::Jpeg => "image/jpeg",
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct ExportedImage {
    pub mime_type: &'static str,
    pub data: Vec<u8>,
}

pub fn export_raster(
    layer: &Layer,
    viewport: Viewport,
    format: RasterFormat,
    quality: f32,
) -> Result<ExportedImage, ExportError> {
    let image = rasterize(layer, viewport)?;
    let mut data = Vec::new();
    match format {
        RasterFormat::Png => {
            image.write_to(&mut Cursor::new(&mut data), ImageFormat::Png)?;
        }
        RasterFormat::Jpeg => {
            let rgb = DynamicImage::ImageRgba8(image).to_rgb8();
            let mut encoder = JpegEncoder::new_with_quality(&mut data, jpeg_quality(quality));
            encoder.encode_image(&rgb)?;
        }
    }
    Ok(ExportedImage {
        mime_type: format.mime_type(),
        data,
    })
}

fn jpeg_quality(quality: f32) -> u8 {
    let quality = if quality.is_finite() && quality > 0.0 && quality <= 1.0 {
        quality
    } else {
        DEFAULT_JPEG_QUALITY
    };
    (quality * 100.0).round().clamp(1.0, 100.0) as u8
}

/// Rebuilds the history as an SVG document from the stroke geometry itself.
pub fn export_vector(history: &[Stroke], viewport: Viewport, background: &str) -> String {
    let width = viewport.width.round();
    let height = viewport.height.round();
    let background = escape_xml(background);

    let mut parts = Vec::with_capacity(history.len() + 4);
    parts.push(r#"<?xml version="1.0" encoding="UTF-8"?>"#.to_string());
    parts.push(format!(
        r#"<svg xmlns="http://www.w3.org/2000/svg" width="{width}" height="{height}" viewBox="0 0 {width} {height}">"#
    ));
    parts.push(format!(
        r#"<rect width="100%" height="100%" fill="{background}" />"#
    ));
    for stroke in history {
        let Some(path) = smooth_path(&stroke.points) else {
            continue;
        };
        let color = match stroke.tool {
            Tool::Eraser => background.clone(),
            Tool::Brush if stroke.color.is_empty() => DEFAULT_COLOR.to_string(),
            Tool::Brush => escape_xml(&stroke.color),
        };
        parts.push(format!(
            r#"<path d="{}" stroke="{}" stroke-width="{}" fill="none" stroke-linecap="round" stroke-linejoin="round" />"#,
            path.to_svg(),
            color,
            clamp_width(stroke.width)
        ));
    }
    parts.push("</svg>".to_string());
    parts.join("\n")
}

pub fn escape_xml(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            _ => out.push(c),
        }
    }
    out
}

/// Accepts a bare stroke array or an object carrying a `strokes` field.
pub fn parse_history_text(text: &str) -> Option<Vec<Stroke>> {
    #[derive(Deserialize)]
    struct HistoryFile {
        strokes: Vec<Stroke>,
    }
    let text = text.trim();
    if let Ok(file) = serde_json::from_str::<HistoryFile>(text) {
        return Some(file.strokes);
    }
    serde_json::from_str::<Vec<Stroke>>(text).ok()
}

/// Also accepts a binary `history` frame as captured off the wire.
pub fn parse_history_bytes(bytes: &[u8]) -> Option<Vec<Stroke>> {
    if let Ok(ServerMessage::History { strokes }) =
        decode_frame::<ServerMessage>(&WireFrame::Binary(bytes.to_vec()))
    {
        return Some(strokes);
    }
    let text = std::str::from_utf8(bytes).ok()?;
    parse_history_text(text)
}
