//! Minimal 3×5 bitmap glyphs for on-frame labels.
//!
//! Covers digits, '.' and 'm', the full alphabet of confidence and
//! distance labels. Unknown characters render as blank cells.

use image::RgbImage;

/// Horizontal advance between characters, in glyph cells.
const ADVANCE: i32 = 4;

fn glyph(ch: char) -> [u8; 5] {
    match ch {
        '0' => [0b111, 0b101, 0b101, 0b101, 0b111],
        '1' => [0b010, 0b110, 0b010, 0b010, 0b111],
        '2' => [0b111, 0b001, 0b111, 0b100, 0b111],
        '3' => [0b111, 0b001, 0b111, 0b001, 0b111],
        '4' => [0b101, 0b101, 0b111, 0b001, 0b001],
        '5' => [0b111, 0b100, 0b111, 0b001, 0b111],
        '6' => [0b111, 0b100, 0b111, 0b101, 0b111],
        '7' => [0b111, 0b001, 0b010, 0b010, 0b010],
        '8' => [0b111, 0b101, 0b111, 0b101, 0b111],
        '9' => [0b111, 0b101, 0b111, 0b001, 0b111],
        '.' => [0b000, 0b000, 0b000, 0b000, 0b010],
        'm' => [0b000, 0b000, 0b110, 0b111, 0b101],
        _ => [0b000, 0b000, 0b000, 0b000, 0b000],
    }
}

/// Draw `text` with its top-left corner at `(x, y)`. Pixels falling outside
/// the image are skipped, so labels near frame edges clip instead of
/// panicking.
pub(crate) fn draw_text(img: &mut RgbImage, x: i32, y: i32, text: &str, scale: i32, color: [u8; 3]) {
    let mut cursor_x = x;
    for ch in text.chars() {
        draw_char(img, cursor_x, y, ch, scale, color);
        cursor_x += ADVANCE * scale;
    }
}

fn draw_char(img: &mut RgbImage, x: i32, y: i32, ch: char, scale: i32, color: [u8; 3]) {
    let bitmap = glyph(ch);
    for (row, bits) in bitmap.iter().enumerate() {
        for col in 0..3 {
            if (bits >> (2 - col)) & 1 == 1 {
                for dy in 0..scale {
                    for dx in 0..scale {
                        let px = x + col as i32 * scale + dx;
                        let py = y + row as i32 * scale + dy;
                        if px >= 0
                            && py >= 0
                            && px < img.width() as i32
                            && py < img.height() as i32
                        {
                            img.put_pixel(px as u32, py as u32, image::Rgb(color));
                        }
                    }
                }
            }
        }
    }
}
