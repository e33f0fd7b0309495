use crate::{data::DigitItem, evaluate::Prediction, Error};
use image::{GrayImage, Luma};
use std::{fs, path::Path};

/// Each digit pixel becomes a `SCALE x SCALE` block.
const SCALE: u32 = 4;
/// Each font pixel becomes a `FONT_SCALE x FONT_SCALE` block.
const FONT_SCALE: u32 = 2;
const GLYPH_WIDTH: u32 = 3;
const GLYPH_HEIGHT: u32 = 5;
const PADDING: u32 = 4;
const CAPTION_HEIGHT: u32 = GLYPH_HEIGHT * FONT_SCALE + 2 * PADDING;

const BACKGROUND: Luma<u8> = Luma([32]);
const INK: Luma<u8> = Luma([255]);

/// 3x5 bitmaps of the digits, one row per entry, most significant bit left.
const GLYPHS: [[u8; 5]; 10] = [
    [0b111, 0b101, 0b101, 0b101, 0b111],
    [0b010, 0b110, 0b010, 0b010, 0b111],
    [0b111, 0b001, 0b111, 0b100, 0b111],
    [0b111, 0b001, 0b111, 0b001, 0b111],
    [0b101, 0b101, 0b111, 0b001, 0b001],
    [0b111, 0b100, 0b111, 0b001, 0b111],
    [0b111, 0b100, 0b111, 0b101, 0b111],
    [0b111, 0b001, 0b001, 0b001, 0b001],
    [0b111, 0b101, 0b111, 0b101, 0b111],
    [0b111, 0b101, 0b111, 0b001, 0b111],
];

fn fill(img: &mut GrayImage, x: u32, y: u32, size: u32, color: Luma<u8>) {
    for dx in 0..size {
        for dy in 0..size {
            img.put_pixel(x + dx, y + dy, color);
        }
    }
}

fn draw_digit(img: &mut GrayImage, digit: u8, x: u32, y: u32) {
    let glyph = GLYPHS[digit as usize % GLYPHS.len()];

    for (row, bits) in glyph.iter().enumerate() {
        for col in 0..GLYPH_WIDTH {
            if bits >> (GLYPH_WIDTH - 1 - col) & 1 == 1 {
                let px = x + col * FONT_SCALE;
                let py = y + row as u32 * FONT_SCALE;
                fill(img, px, py, FONT_SCALE, INK);
            }
        }
    }
}

fn to_luma(intensity: f32) -> Luma<u8> {
    Luma([(intensity.clamp(0.0, 1.0) * 255.0).round() as u8])
}

/// Tiles `items` into a grid with `columns` tiles per row.
///
/// Each tile is captioned with the label on the left and, when given, the
/// predicted digit on the right.
pub fn render_grid(
    items: &[DigitItem],
    predictions: Option<&[Prediction]>,
    columns: usize,
) -> GrayImage {
    let columns = columns.clamp(1, items.len().max(1));
    let rows = items.len().div_ceil(columns).max(1);

    let tile_width = items.iter().map(|item| item.width()).max().unwrap_or(0) as u32 * SCALE;
    let tile_width = tile_width.max(2 * (GLYPH_WIDTH * FONT_SCALE + PADDING) + PADDING);
    let tile_height = items.iter().map(|item| item.height()).max().unwrap_or(0) as u32 * SCALE
        + CAPTION_HEIGHT;

    let mut img = GrayImage::from_pixel(
        columns as u32 * (tile_width + PADDING) + PADDING,
        rows as u32 * (tile_height + PADDING) + PADDING,
        BACKGROUND,
    );

    for (index, item) in items.iter().enumerate() {
        let x0 = PADDING + (index % columns) as u32 * (tile_width + PADDING);
        let y0 = PADDING + (index / columns) as u32 * (tile_height + PADDING);

        for row in 0..item.height() {
            for col in 0..item.width() {
                let x = x0 + col as u32 * SCALE;
                let y = y0 + row as u32 * SCALE;
                fill(&mut img, x, y, SCALE, to_luma(item.intensity(row, col)));
            }
        }

        let caption_y = y0 + item.height() as u32 * SCALE + PADDING;
        draw_digit(&mut img, item.label, x0 + PADDING, caption_y);

        if let Some(prediction) = predictions.and_then(|predictions| predictions.get(index)) {
            let x = x0 + tile_width - PADDING - GLYPH_WIDTH * FONT_SCALE;
            draw_digit(&mut img, prediction.label, x, caption_y);
        }
    }

    img
}

/// Renders the grid and writes it as a PNG, creating parent directories.
pub fn save_grid(
    items: &[DigitItem],
    predictions: Option<&[Prediction]>,
    columns: usize,
    path: impl AsRef<Path>,
) -> Result<(), Error> {
    let path = path.as_ref();

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    render_grid(items, predictions, columns).save(path)?;
    log::info!("Wrote {} digits to {}", items.len(), path.display());

    Ok(())
}

/// Terminal rendering of a digit, one line per pixel row.
pub fn ascii(item: &DigitItem) -> String {
    const RAMP: [char; 5] = [' ', '.', ':', '*', '#'];

    let mut out = String::with_capacity(item.height() * (item.width() + 1));
    for row in 0..item.height() {
        for col in 0..item.width() {
            let level = (item.intensity(row, col).clamp(0.0, 1.0) * 4.0).round() as usize;
            out.push(RAMP[level]);
        }
        out.push('\n');
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn diagonal(size: usize, label: u8) -> DigitItem {
        let mut pixels = vec![0.0; size * size];
        for i in 0..size {
            pixels[i * size + i] = 1.0;
        }
        DigitItem {
            pixels,
            shape: [size, size, 1],
            label,
        }
    }

    #[test]
    fn grid_has_one_tile_per_item() {
        let items: Vec<_> = (0..5).map(|label| diagonal(28, label)).collect();

        let img = render_grid(&items, None, 3);

        let tile_width = 28 * SCALE;
        let tile_height = 28 * SCALE + CAPTION_HEIGHT;
        assert_eq!(img.width(), 3 * (tile_width + PADDING) + PADDING);
        assert_eq!(img.height(), 2 * (tile_height + PADDING) + PADDING);
    }

    #[test]
    fn pixels_are_upscaled_into_tiles() {
        let img = render_grid(&[diagonal(4, 1)], None, 1);

        assert_eq!(img.get_pixel(PADDING, PADDING), &INK);
        assert_eq!(img.get_pixel(PADDING + SCALE, PADDING), &Luma([0]));
        assert_eq!(img.get_pixel(PADDING + SCALE, PADDING + SCALE), &INK);
    }

    #[test]
    fn captions_draw_label_and_prediction() {
        let items = [diagonal(28, 1)];
        let predictions = [Prediction {
            label: 7,
            confidence: 0.9,
        }];
        let without = render_grid(&items, None, 1);
        let with = render_grid(&items, Some(&predictions), 1);

        let caption_y = PADDING + 28 * SCALE + PADDING;
        let prediction_x = PADDING + 28 * SCALE - PADDING - GLYPH_WIDTH * FONT_SCALE;
        // Top row of the glyph for 1 only lights its middle column.
        assert_eq!(without.get_pixel(2 * PADDING, caption_y), &BACKGROUND);
        assert_eq!(
            without.get_pixel(2 * PADDING + FONT_SCALE, caption_y),
            &INK
        );
        assert_eq!(without.get_pixel(prediction_x, caption_y), &BACKGROUND);
        assert_eq!(with.get_pixel(prediction_x, caption_y), &INK);
    }

    #[test]
    fn grid_is_written_as_png() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/samples.png");

        save_grid(&[diagonal(28, 3)], None, 3, &path).unwrap();

        let img = image::open(&path).unwrap();
        assert_eq!(img.width(), 28 * SCALE + 2 * PADDING);
    }

    #[test]
    fn ascii_has_one_line_per_row() {
        let art = ascii(&diagonal(3, 0));

        assert_eq!(art, "#  \n # \n  #\n");
    }
}
