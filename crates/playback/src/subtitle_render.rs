//! Turning subtitle cues into positioned overlays.
//!
//! Bitmap subtitles are scaled and translated into container coordinates;
//! text subtitles are laid out as an SVG document and rasterized with the
//! content's fonts.

use std::sync::Arc;

use image::RgbaImage;
use reelforge_media::{BitmapSubtitle, StringSubtitle, SubtitleLine, VReference};
use reelforge_state::content::{Colour, TextEffect, TextPart};
use reelforge_state::time::{ContentTime, ContentTimePeriod};
use reelforge_state::{Position, Size};

use crate::error::{PlaybackError, PlaybackResult};
use crate::player_video::Overlay;

/// Point size used when a cue does not specify one.
pub const DEFAULT_FONT_SIZE_POINTS: f64 = 48.0;

/// Reference screen height for point sizes: a 48 pt line occupies 48/1080 of
/// the picture height.
const REFERENCE_HEIGHT: f64 = 1080.0;

/// Where the bottom line of a "placed" subtitle sits.  Slightly above the
/// bottom edge; policy, not an exact standard.
const PLACED_BOTTOM_ANCHOR: f64 = 1.015;

/// Baseline-to-baseline distance as a multiple of the font size.
const LINE_HEIGHT_FACTOR: f64 = 1.2;

/// Scale and place a bitmap subtitle.  The scale factors are applied about
/// the centre of the subtitle's rectangle, then the offsets translate it.
pub fn place_bitmap(sub: &BitmapSubtitle, part: &TextPart, container: Size) -> Option<Overlay> {
    let mut rect = sub.rectangle;
    rect.x += part.x_offset;
    rect.y += part.y_offset;

    let scaled = Size::new(
        (rect.width * f64::from(container.width) * part.x_scale).round() as u32,
        (rect.height * f64::from(container.height) * part.y_scale).round() as u32,
    );
    if scaled.width == 0 || scaled.height == 0 {
        return None;
    }

    let image = image::imageops::resize(
        sub.image.as_ref(),
        scaled.width,
        scaled.height,
        image::imageops::FilterType::CatmullRom,
    );

    let position = Position::new(
        (f64::from(container.width) * (rect.x + rect.width * (1.0 - part.x_scale) / 2.0)).round()
            as i32,
        (f64::from(container.height) * (rect.y + rect.height * (1.0 - part.y_scale) / 2.0)).round()
            as i32,
    );

    Some(Overlay {
        image: Arc::new(image),
        position,
    })
}

/// Alpha multiplier for a cue at content time `t` given the part's fades.
pub fn fade_factor(part: &TextPart, period: ContentTimePeriod, t: ContentTime) -> f64 {
    let mut factor: f64 = 1.0;
    if let Some(fade_in) = part.fade_in {
        if fade_in > ContentTime::ZERO {
            let into = (t - period.from).clamp_non_negative();
            factor *= (into.seconds() / fade_in.seconds()).min(1.0);
        }
    }
    if let Some(fade_out) = part.fade_out {
        if fade_out > ContentTime::ZERO {
            let left = (period.to - t).clamp_non_negative();
            factor *= (left.seconds() / fade_out.seconds()).min(1.0);
        }
    }
    factor.clamp(0.0, 1.0)
}

/// Render a text cue to a container-sized overlay.  Returns None for cues
/// with no visible text.
pub fn render_text(
    sub: &StringSubtitle,
    part: &TextPart,
    container: Size,
    fade: f64,
) -> PlaybackResult<Option<Overlay>> {
    if sub.lines.iter().all(|l| l.text.trim().is_empty()) || fade <= 0.0 {
        return Ok(None);
    }

    let svg = build_svg(sub, part, container, fade);
    let image = rasterize(&svg, container, part)?;

    Ok(Some(Overlay {
        image: Arc::new(image),
        position: Position::new(0, 0),
    }))
}

fn build_svg(sub: &StringSubtitle, part: &TextPart, container: Size, fade: f64) -> String {
    let width = f64::from(container.width);
    let height = f64::from(container.height);

    let mut svg = format!(
        r#"<svg xmlns="http://www.w3.org/2000/svg" width="{w}" height="{h}" viewBox="0 0 {w} {h}">"#,
        w = container.width,
        h = container.height
    );

    let baselines = line_baselines(&sub.lines, part);
    for (line, baseline) in sub.lines.iter().zip(baselines) {
        if line.text.trim().is_empty() {
            continue;
        }
        let size_px = font_size_px(line, part, container);
        let x = width * (0.5 + part.x_offset);
        let y = baseline * height;
        let colour = line.colour.unwrap_or(part.colour.unwrap_or(Colour {
            r: 255,
            g: 255,
            b: 255,
        }));

        let mut attrs = format!(
            r#"x="{x:.1}" y="{y:.1}" font-size="{size_px:.1}" text-anchor="middle" fill="{}" fill-opacity="{fade:.3}""#,
            colour_hex(colour),
        );
        if let Some(font) = part.fonts.first() {
            attrs.push_str(&format!(r#" font-family="{}, sans-serif""#, escape(&font.id)));
        }
        if line.italic {
            attrs.push_str(r#" font-style="italic""#);
        }
        match part.effect {
            TextEffect::Outline => {
                let ec = part.effect_colour.unwrap_or(Colour { r: 0, g: 0, b: 0 });
                attrs.push_str(&format!(
                    r#" stroke="{}" stroke-width="{:.1}" paint-order="stroke""#,
                    colour_hex(ec),
                    f64::from(part.outline_width) * size_px / 64.0,
                ));
            }
            TextEffect::Shadow => {
                let ec = part.effect_colour.unwrap_or(Colour { r: 0, g: 0, b: 0 });
                let off = size_px / 16.0;
                svg.push_str(&format!(
                    r#"<text x="{:.1}" y="{:.1}" font-size="{size_px:.1}" text-anchor="middle" fill="{}" fill-opacity="{:.3}">{}</text>"#,
                    x + off,
                    y + off,
                    colour_hex(ec),
                    fade,
                    escape(&line.text),
                ));
            }
            TextEffect::None => {}
        }

        svg.push_str(&format!(r#"<text {attrs}>{}</text>"#, escape(&line.text)));
    }

    svg.push_str("</svg>");
    svg
}

/// Normalized baseline (0..1 of screen height) for each line.
fn line_baselines(lines: &[SubtitleLine], part: &TextPart) -> Vec<f64> {
    let placed = lines
        .iter()
        .any(|l| l.v_reference == VReference::TopOfSubtitle);

    if placed {
        // Lay the whole cue out just above the bottom of the screen: the
        // bottom-most line anchors and the rest stack upwards.
        let font_proportional = lines
            .iter()
            .map(|l| l.size_points.unwrap_or(DEFAULT_FONT_SIZE_POINTS))
            .fold(0.0f64, f64::max)
            / REFERENCE_HEIGHT;
        let line_height = LINE_HEIGHT_FACTOR * part.line_spacing * part.y_scale * font_proportional;
        let bottom = PLACED_BOTTOM_ANCHOR - line_height + part.y_offset;
        let n = lines.len();
        (0..n)
            .map(|i| bottom - (n - 1 - i) as f64 * line_height)
            .collect()
    } else {
        lines.iter().map(|l| l.v_position + part.y_offset).collect()
    }
}

fn font_size_px(line: &SubtitleLine, part: &TextPart, container: Size) -> f64 {
    line.size_points.unwrap_or(DEFAULT_FONT_SIZE_POINTS) * part.y_scale
        * f64::from(container.height)
        / REFERENCE_HEIGHT
}

fn colour_hex(c: Colour) -> String {
    format!("#{:02x}{:02x}{:02x}", c.r, c.g, c.b)
}

/// SVG/HTML metacharacters must not leak into the document.
fn escape(raw: &str) -> String {
    raw.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

fn rasterize(svg: &str, container: Size, part: &TextPart) -> PlaybackResult<RgbaImage> {
    let mut db = usvg::fontdb::Database::new();
    db.load_system_fonts();
    for font in &part.fonts {
        if let Some(file) = &font.file {
            let _ = db.load_font_file(file);
        }
    }

    let opts = usvg::Options {
        fontdb: Arc::new(db),
        ..Default::default()
    };
    let tree = usvg::Tree::from_data(svg.as_bytes(), &opts)
        .map_err(|e| PlaybackError::Render(e.to_string()))?;

    let mut pixmap = resvg::tiny_skia::Pixmap::new(container.width, container.height)
        .ok_or_else(|| PlaybackError::Render("could not allocate subtitle pixmap".to_string()))?;
    resvg::render(
        &tree,
        resvg::tiny_skia::Transform::identity(),
        &mut pixmap.as_mut(),
    );

    // tiny-skia produces premultiplied alpha; the compositor wants straight.
    let mut data = pixmap.take();
    for px in data.chunks_exact_mut(4) {
        let a = px[3] as u16;
        if a > 0 && a < 255 {
            px[0] = ((px[0] as u16 * 255) / a).min(255) as u8;
            px[1] = ((px[1] as u16 * 255) / a).min(255) as u8;
            px[2] = ((px[2] as u16 * 255) / a).min(255) as u8;
        }
    }

    RgbaImage::from_raw(container.width, container.height, data)
        .ok_or_else(|| PlaybackError::Render("subtitle pixmap has wrong size".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use reelforge_media::VReference;
    use reelforge_state::content::TextKind;
    use reelforge_state::Rect;

    fn part() -> TextPart {
        let mut p = TextPart::new(TextKind::OpenSubtitle);
        p.use_ = true;
        p
    }

    #[test]
    fn unit_scale_and_zero_offset_map_rect_onto_container() {
        let container = Size::new(1998, 1080);
        let sub = BitmapSubtitle {
            image: Arc::new(RgbaImage::from_pixel(
                100,
                50,
                image::Rgba([255, 255, 255, 255]),
            )),
            rectangle: Rect::new(0.25, 0.75, 0.5, 0.1),
            period: ContentTimePeriod::default(),
        };

        let overlay = place_bitmap(&sub, &part(), container).unwrap();
        assert_eq!(overlay.position.x, (1998.0 * 0.25_f64).round() as i32);
        assert_eq!(overlay.position.y, (1080.0 * 0.75_f64).round() as i32);
        assert_eq!(overlay.image.width(), (1998.0 * 0.5_f64).round() as u32);
        assert_eq!(overlay.image.height(), 108);
    }

    #[test]
    fn half_scale_shrinks_about_the_rect_centre() {
        let container = Size::new(1000, 1000);
        let mut p = part();
        p.x_scale = 0.5;
        p.y_scale = 0.5;
        let sub = BitmapSubtitle {
            image: Arc::new(RgbaImage::from_pixel(10, 10, image::Rgba([255; 4]))),
            rectangle: Rect::new(0.2, 0.2, 0.4, 0.4),
            period: ContentTimePeriod::default(),
        };

        let overlay = place_bitmap(&sub, &p, container).unwrap();
        // Scaled to half size, shifted in by a quarter of the original.
        assert_eq!(overlay.image.width(), 200);
        assert_eq!(overlay.position.x, 300);
        assert_eq!(overlay.position.y, 300);
    }

    #[test]
    fn fade_ramps_in_and_out() {
        let mut p = part();
        p.fade_in = Some(ContentTime::from_seconds(1.0));
        p.fade_out = Some(ContentTime::from_seconds(2.0));
        let period = ContentTimePeriod::new(
            ContentTime::from_seconds(10.0),
            ContentTime::from_seconds(20.0),
        );

        assert_eq!(fade_factor(&p, period, ContentTime::from_seconds(10.0)), 0.0);
        assert!((fade_factor(&p, period, ContentTime::from_seconds(10.5)) - 0.5).abs() < 1e-9);
        assert_eq!(fade_factor(&p, period, ContentTime::from_seconds(15.0)), 1.0);
        assert!((fade_factor(&p, period, ContentTime::from_seconds(19.0)) - 0.5).abs() < 1e-9);
    }

    #[test]
    fn metacharacters_are_escaped() {
        assert_eq!(escape("a <b> & \"c\""), "a &lt;b&gt; &amp; &quot;c&quot;");
    }

    #[test]
    fn placed_lines_stack_upwards_from_the_anchor() {
        let p = part();
        let lines = vec![
            SubtitleLine::plain("top", 0),
            SubtitleLine::plain("bottom", 1),
        ];
        let baselines = line_baselines(&lines, &p);
        let line_height = LINE_HEIGHT_FACTOR * (DEFAULT_FONT_SIZE_POINTS / REFERENCE_HEIGHT);
        assert!((baselines[1] - (PLACED_BOTTOM_ANCHOR - line_height)).abs() < 1e-9);
        assert!((baselines[0] - (baselines[1] - line_height)).abs() < 1e-9);
    }

    #[test]
    fn render_text_smoke() {
        let sub = StringSubtitle {
            lines: vec![SubtitleLine {
                text: "Hello <world>".to_string(),
                italic: false,
                colour: None,
                size_points: None,
                v_position: 0.9,
                v_reference: VReference::Proportional,
                font_id: None,
            }],
            period: ContentTimePeriod::default(),
        };
        let overlay = render_text(&sub, &part(), Size::new(320, 180), 1.0)
            .unwrap()
            .unwrap();
        assert_eq!(overlay.image.width(), 320);
        assert_eq!(overlay.image.height(), 180);
    }
}
