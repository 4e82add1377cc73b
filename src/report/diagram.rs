use std::io::Cursor;

use anyhow::{Context, Result};
use image::{ImageFormat, Rgb, RgbImage};

use crate::cycles::DisplayScrew;

const WIDTH: u32 = 600;
const HEIGHT: u32 = 400;
const MARKER_RADIUS: i64 = 10;

const BACKGROUND: Rgb<u8> = Rgb([255, 255, 255]);
const OUTLINE: Rgb<u8> = Rgb([60, 60, 60]);
const PASS_FILL: Rgb<u8> = Rgb([40, 167, 69]);
const FAIL_FILL: Rgb<u8> = Rgb([220, 53, 69]);

/// Screw locations on the fixture, as (left %, top %) of the base plate.
const MARKER_LAYOUT: [(f32, f32); 19] = [
    (47.2, 64.0),
    (45.0, 69.5),
    (38.0, 66.5),
    (39.0, 48.8),
    (49.0, 48.8),
    (65.0, 48.8),
    (82.0, 49.8),
    (81.8, 57.8),
    (81.8, 65.8),
    (75.0, 71.0),
    (65.0, 71.0),
    (56.0, 69.0),
    (24.7, 67.8),
    (18.3, 68.8),
    (20.0, 48.8),
    (15.5, 11.0),
    (29.2, 11.5),
    (43.0, 12.0),
    (61.5, 12.5),
];

/// Pixel centre for a 1-based display position. Positions past the fixture
/// layout go on a row along the bottom edge.
pub fn marker_center(display_position: usize) -> (i64, i64) {
    let to_px = |percent: f32, span: u32| (percent / 100.0 * span as f32).round() as i64;

    match display_position
        .checked_sub(1)
        .and_then(|offset| MARKER_LAYOUT.get(offset))
    {
        Some(&(left, top)) => (to_px(left, WIDTH), to_px(top, HEIGHT)),
        None => {
            let extra = display_position.saturating_sub(MARKER_LAYOUT.len() + 1) as i64;
            let step = MARKER_RADIUS * 3;
            let per_row = (WIDTH as i64 - step) / step;
            (
                step + (extra % per_row) * step,
                HEIGHT as i64 - step - (extra / per_row) * step,
            )
        }
    }
}

/// PNG of the fixture with one filled marker per screw.
pub fn render_status_diagram(screws: &[DisplayScrew]) -> Result<Vec<u8>> {
    let mut canvas = RgbImage::from_pixel(WIDTH, HEIGHT, BACKGROUND);

    for screw in screws {
        let (cx, cy) = marker_center(screw.display_position);
        let fill = if screw.passed { PASS_FILL } else { FAIL_FILL };
        draw_marker(&mut canvas, cx, cy, fill);
    }

    let mut bytes = Cursor::new(Vec::new());
    canvas
        .write_to(&mut bytes, ImageFormat::Png)
        .context("failed to encode status diagram")?;
    Ok(bytes.into_inner())
}

fn draw_marker(canvas: &mut RgbImage, cx: i64, cy: i64, fill: Rgb<u8>) {
    let outer = MARKER_RADIUS + 2;
    for dy in -outer..=outer {
        for dx in -outer..=outer {
            let (x, y) = (cx + dx, cy + dy);
            if x < 0 || y < 0 || x >= WIDTH as i64 || y >= HEIGHT as i64 {
                continue;
            }
            let distance_sq = dx * dx + dy * dy;
            if distance_sq <= MARKER_RADIUS * MARKER_RADIUS {
                canvas.put_pixel(x as u32, y as u32, fill);
            } else if distance_sq <= outer * outer {
                canvas.put_pixel(x as u32, y as u32, OUTLINE);
            }
        }
    }
}
