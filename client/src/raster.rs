use image::RgbaImage;
use kurbo::{Affine, BezPath, Cap, Join, PathEl, StrokeOpts};
use vello_cpu::peniko::color::{parse_color, Srgb};

use crate::error::ExportError;
use crate::render::{DrawOp, Layer, Viewport};

const STROKE_TOLERANCE: f64 = 0.1;
const FALLBACK_RGBA: [u8; 4] = [0, 0, 0, 255];

/// Replays a layer at device resolution and returns straight-alpha RGBA pixels.
pub fn rasterize(layer: &Layer, viewport: Viewport) -> Result<RgbaImage, ExportError> {
    let width = viewport.pixel_width();
    let height = viewport.pixel_height();
    let invalid = || ExportError::InvalidSize { width, height };
    let w: u16 = width.try_into().map_err(|_| invalid())?;
    let h: u16 = height.try_into().map_err(|_| invalid())?;
    if w == 0 || h == 0 {
        return Err(invalid());
    }

    let scale = Affine::scale(viewport.pixel_ratio);
    let mut ctx = vello_cpu::RenderContext::new(w, h);
    for op in layer.ops() {
        match op {
            DrawOp::Fill { color } => {
                ctx.set_paint(css_color(color));
                ctx.fill_rect(&vello_cpu::kurbo::Rect::new(
                    0.0,
                    0.0,
                    f64::from(w),
                    f64::from(h),
                ));
            }
            DrawOp::Stroke { path, color, width } => {
                let style = kurbo::Stroke::new(width * viewport.pixel_ratio)
                    .with_caps(Cap::Round)
                    .with_join(Join::Round);
                let outline = kurbo::stroke(
                    (scale * path.clone()).iter(),
                    &style,
                    &StrokeOpts::default(),
                    STROKE_TOLERANCE,
                );
                ctx.set_paint(css_color(color));
                ctx.fill_path(&bezpath_to_cpu(&outline));
            }
        }
    }
    ctx.flush();

    let mut pixmap = vello_cpu::Pixmap::new(w, h);
    ctx.render_to_pixmap(&mut pixmap);
    let straight = unpremultiply(pixmap.data_as_u8_slice());
    RgbaImage::from_raw(width, height, straight).ok_or_else(invalid)
}

pub fn css_rgba(raw: &str) -> [u8; 4] {
    match parse_color(raw.trim()) {
        Ok(color) => {
            let rgba = color.to_alpha_color::<Srgb>().to_rgba8();
            [rgba.r, rgba.g, rgba.b, rgba.a]
        }
        Err(_) => {
            log::debug!("unparsable color {raw:?}, painting black");
            FALLBACK_RGBA
        }
    }
}

fn css_color(raw: &str) -> vello_cpu::peniko::Color {
    let [r, g, b, a] = css_rgba(raw);
    vello_cpu::peniko::Color::from_rgba8(r, g, b, a)
}

fn unpremultiply(premul: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(premul.len());
    for px in premul.chunks_exact(4) {
        let a = px[3];
        if a == 0 {
            out.extend_from_slice(&[0, 0, 0, 0]);
            continue;
        }
        let a16 = u16::from(a);
        for &c in &px[..3] {
            let value = (u16::from(c) * 255 + a16 / 2) / a16;
            out.push(value.min(255) as u8);
        }
        out.push(a);
    }
    out
}

fn point_to_cpu(p: kurbo::Point) -> vello_cpu::kurbo::Point {
    vello_cpu::kurbo::Point::new(p.x, p.y)
}

fn bezpath_to_cpu(path: &BezPath) -> vello_cpu::kurbo::BezPath {
    let mut out = vello_cpu::kurbo::BezPath::new();
    for &el in path.elements() {
        match el {
            PathEl::MoveTo(p) => out.move_to(point_to_cpu(p)),
            PathEl::LineTo(p) => out.line_to(point_to_cpu(p)),
            PathEl::QuadTo(p1, p2) => out.quad_to(point_to_cpu(p1), point_to_cpu(p2)),
            PathEl::CurveTo(p1, p2, p3) => {
                out.curve_to(point_to_cpu(p1), point_to_cpu(p2), point_to_cpu(p3));
            }
            PathEl::ClosePath => out.close_path(),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::Surfaces;
    use inkrelay_shared::{Point, Stroke, StrokeId, Tool};

    #[test]
    fn test_css_rgba() {
        assert_eq!(css_rgba("#ff0000"), [255, 0, 0, 255]);
        assert_eq!(css_rgba("#fff"), [255, 255, 255, 255]);
        assert_eq!(css_rgba("not a color"), FALLBACK_RGBA);
    }

    #[test]
    fn test_unpremultiply() {
        assert_eq!(unpremultiply(&[0, 0, 0, 0]), vec![0, 0, 0, 0]);
        assert_eq!(unpremultiply(&[128, 0, 0, 128]), vec![255, 0, 0, 128]);
        assert_eq!(unpremultiply(&[10, 20, 30, 255]), vec![10, 20, 30, 255]);
    }

    #[test]
    fn test_rasterize_stroke_over_background() {
        let mut surfaces = Surfaces::new();
        surfaces.configure(20.0, 20.0, 1.0);
        let stroke = Stroke {
            stroke_id: StrokeId::new("me", "1"),
            tool: Tool::Brush,
            color: "#000000".to_string(),
            width: 4.0,
            points: vec![Point::new(2.0, 10.0), Point::new(18.0, 10.0)],
        };
        surfaces.redraw_all(&[stroke], "#ffffff");
        let image = rasterize(surfaces.base_layer(), surfaces.viewport().unwrap()).unwrap();
        assert_eq!(image.dimensions(), (20, 20));
        assert_eq!(image.get_pixel(10, 10).0, [0, 0, 0, 255]);
        assert_eq!(image.get_pixel(10, 2).0, [255, 255, 255, 255]);
    }

    #[test]
    fn test_rasterize_scales_by_pixel_ratio() {
        let mut surfaces = Surfaces::new();
        surfaces.configure(10.0, 5.0, 2.0);
        surfaces.clear("#00ff00");
        let image = rasterize(surfaces.base_layer(), surfaces.viewport().unwrap()).unwrap();
        assert_eq!(image.dimensions(), (20, 10));
        assert_eq!(image.get_pixel(19, 9).0, [0, 255, 0, 255]);
    }

    #[test]
    fn test_rasterize_empty_viewport_fails() {
        let layer = Layer::default();
        let err = rasterize(&layer, Viewport::new(0.0, 10.0, 1.0)).unwrap_err();
        assert!(matches!(err, ExportError::InvalidSize { width: 0, height: 10 }));
    }
}
