// Window + HUD drawing.
// 1) A window that shows the screen surface the payloads mangle.
// 2) An optional overlay: a crosshair at the pointer and a tiny 5x7 text line.
//    The overlay is drawn on a copy, so payloads never see it.

use crate::error::Error;
use crate::types::FrameBuffer;
use minifb::{Key, MouseMode, Window, WindowOptions};

pub struct Drawer {
    window: Window,
}

impl Drawer {
    /// Open a window the size of the screen surface, refreshed at most `fps` times a second.
    pub fn new(title: &str, width: usize, height: usize, fps: usize) -> Result<Self, Error> {
        let mut window = Window::new(title, width, height, WindowOptions::default())
            .map_err(|e| Error::WindowInit(e.to_string()))?;
        window.set_target_fps(fps);
        Ok(Self { window })
    }

    /// Push the pixels for this frame to the screen.
    pub fn present(&mut self, framebuffer: &FrameBuffer) -> Result<(), Error> {
        self.window
            .update_with_buffer(&framebuffer.pixels, framebuffer.width, framebuffer.height)
            .map_err(|e| Error::WindowUpdate(e.to_string()))?;
        Ok(())
    }

    /// Returns false when the user closes the window (so we can stop the loop).
    pub fn is_open(&self) -> bool {
        self.window.is_open()
    }

    pub fn esc_pressed(&self) -> bool {
        self.window.is_key_down(Key::Escape)
    }

    /// Current mouse position in window pixel coordinates (clamped to the window).
    pub fn mouse_pos(&self) -> Option<(usize, usize)> {
        self.window
            .get_mouse_pos(MouseMode::Clamp)
            .map(|(x, y)| (x.max(0.0) as usize, y.max(0.0) as usize))
    }
}

/* ---------- Software drawing: pixels, crosshair, tiny bitmap font ---------- */

/// Draw a thin line between (x0,y0) and (x1,y1) using Bresenham.
fn draw_line(fb: &mut FrameBuffer, x0: i32, y0: i32, x1: i32, y1: i32, color: u32) {
    let (mut x0, mut y0) = (x0, y0);
    let dx = (x1 - x0).abs();
    let sx = if x0 < x1 { 1 } else { -1 };
    let dy = -(y1 - y0).abs();
    let sy = if y0 < y1 { 1 } else { -1 };
    let mut err = dx + dy;
    loop {
        fb.put(x0, y0, color);
        if x0 == x1 && y0 == y1 { break; }
        let e2 = 2 * err;
        if e2 >= dy { err += dy; x0 += sx; }
        if e2 <= dx { err += dx; y0 += sy; }
    }
}

/// A "+" with a small gap at the center.
pub fn draw_crosshair(fb: &mut FrameBuffer, cx: i32, cy: i32, size: i32, color: u32) {
    draw_line(fb, cx - size, cy, cx - 2, cy, color);
    draw_line(fb, cx + 2, cy, cx + size, cy, color);
    draw_line(fb, cx, cy - size, cx, cy - 2, color);
    draw_line(fb, cx, cy + 2, cx, cy + size, color);
    fb.put(cx, cy, color);
}

/// 5x7 glyphs for the HUD line ("TICK 123 | STAGE 1 | FPS: 59.9").
/// Each u8 is a row; the low 5 bits are the pixels (bit 4 = leftmost).
fn glyph5x7(ch: char) -> Option<[u8; 7]> {
    macro_rules! g { ($a:expr,$b:expr,$c:expr,$d:expr,$e:expr,$f:expr,$g:expr) => {
        Some([$a,$b,$c,$d,$e,$f,$g])
    }; }

    match ch {
        '0' => g!(0b01110,0b10001,0b10011,0b10101,0b11001,0b10001,0b01110),
        '1' => g!(0b00100,0b01100,0b00100,0b00100,0b00100,0b00100,0b01110),
        '2' => g!(0b01110,0b10001,0b00001,0b00010,0b00100,0b01000,0b11111),
        '3' => g!(0b11110,0b00001,0b00001,0b01110,0b00001,0b00001,0b11110),
        '4' => g!(0b00010,0b00110,0b01010,0b10010,0b11111,0b00010,0b00010),
        '5' => g!(0b11111,0b10000,0b11110,0b00001,0b00001,0b10001,0b01110),
        '6' => g!(0b00110,0b01000,0b10000,0b11110,0b10001,0b10001,0b01110),
        '7' => g!(0b11111,0b00001,0b00010,0b00100,0b01000,0b01000,0b01000),
        '8' => g!(0b01110,0b10001,0b10001,0b01110,0b10001,0b10001,0b01110),
        '9' => g!(0b01110,0b10001,0b10001,0b01111,0b00001,0b00010,0b01100),

        'A' => g!(0b01110,0b10001,0b10001,0b11111,0b10001,0b10001,0b10001),
        'C' => g!(0b01110,0b10001,0b10000,0b10000,0b10000,0b10001,0b01110),
        'E' => g!(0b11111,0b10000,0b10000,0b11110,0b10000,0b10000,0b11111),
        'F' => g!(0b11111,0b10000,0b10000,0b11110,0b10000,0b10000,0b10000),
        'G' => g!(0b01110,0b10001,0b10000,0b10111,0b10001,0b10001,0b01111),
        'I' => g!(0b01110,0b00100,0b00100,0b00100,0b00100,0b00100,0b01110),
        'K' => g!(0b10001,0b10010,0b10100,0b11000,0b10100,0b10010,0b10001),
        'P' => g!(0b11110,0b10001,0b10001,0b11110,0b10000,0b10000,0b10000),
        'S' => g!(0b01111,0b10000,0b10000,0b01110,0b00001,0b00001,0b11110),
        'T' => g!(0b11111,0b00100,0b00100,0b00100,0b00100,0b00100,0b00100),

        ' ' => g!(0b00000,0b00000,0b00000,0b00000,0b00000,0b00000,0b00000),
        '|' => g!(0b00100,0b00100,0b00100,0b00100,0b00100,0b00100,0b00100),
        ':' => g!(0b00000,0b00100,0b00000,0b00000,0b00100,0b00000,0b00000),
        '.' => g!(0b00000,0b00000,0b00000,0b00000,0b00000,0b00100,0b00000),

        _ => None,
    }
}

/// One glyph with a 1-pixel black shadow for contrast.
fn draw_char_5x7(fb: &mut FrameBuffer, x: i32, y: i32, ch: char, color: u32) {
    let Some(rows) = glyph5x7(ch) else { return };
    // shadow pass first, then the glyph itself
    for (ox, oy, c) in [(1, 1, 0x00000000), (0, 0, color)] {
        for (ry, rowbits) in rows.iter().enumerate() {
            for rx in 0..5 {
                if (rowbits & (1 << (4 - rx))) != 0 {
                    fb.put(x + rx + ox, y + ry as i32 + oy, c);
                }
            }
        }
    }
}

/// Draw a text string using 5x7 glyphs; unknown characters leave a gap.
pub fn draw_text_5x7(fb: &mut FrameBuffer, mut x: i32, y: i32, text: &str, color: u32) {
    for ch in text.chars() {
        draw_char_5x7(fb, x, y, ch.to_ascii_uppercase(), color);
        x += 6; // 5 pixels glyph width + 1 pixel spacing
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hud_text_draws_inside_its_box() {
        let mut fb = FrameBuffer::filled(80, 12, 0x00_33_33_33);
        draw_text_5x7(&mut fb, 1, 1, "TICK 12", 0x00_FF_FF_FF);
        // 'T' top bar, first row
        assert_eq!(fb.get(1, 1), Some(0x00_FF_FF_FF));
        // nothing is drawn past the last glyph + shadow
        assert!((7 * 6 + 2..80).all(|x| fb.get(x, 4) == Some(0x00_33_33_33)));
    }

    #[test]
    fn crosshair_leaves_a_gap_around_center() {
        let mut fb = FrameBuffer::filled(30, 30, 0);
        draw_crosshair(&mut fb, 15, 15, 6, 0x00_FF_CC_33);
        assert_eq!(fb.get(15, 15), Some(0x00_FF_CC_33));
        assert_eq!(fb.get(16, 15), Some(0));
        assert_eq!(fb.get(21, 15), Some(0x00_FF_CC_33));
    }
}
