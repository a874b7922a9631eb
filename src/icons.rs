// The two stock message-box icons DrawError stamps onto the screen.
// Drawn procedurally at 32x32 so no asset files are needed.

use serde::{Deserialize, Serialize};

pub const ICON_SIZE: i32 = 32;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Icon {
    Error,
    Warning,
}

const ERROR_RED: u32 = 0x00_E8_11_23;
const ERROR_RIM: u32 = 0x00_9E_0B_0F;
const WARNING_YELLOW: u32 = 0x00_FF_C8_3D;
const WARNING_RIM: u32 = 0x00_B2_7D_00;
const WHITE: u32 = 0x00_FF_FF_FF;
const BLACK: u32 = 0x00_00_00_00;

impl Icon {
    /// Color of the icon at (x,y) inside its 32x32 cell, or None where it is transparent.
    pub fn pixel(self, x: i32, y: i32) -> Option<u32> {
        if !(0..ICON_SIZE).contains(&x) || !(0..ICON_SIZE).contains(&y) {
            return None;
        }
        match self {
            Icon::Error => error_pixel(x, y),
            Icon::Warning => warning_pixel(x, y),
        }
    }
}

/// Red disc with a white cross.
fn error_pixel(x: i32, y: i32) -> Option<u32> {
    let dx = x as f32 - 15.5;
    let dy = y as f32 - 15.5;
    let d = (dx * dx + dy * dy).sqrt();
    if d > 15.5 { return None; }
    if d > 14.0 { return Some(ERROR_RIM); }
    // cross arms, kept inside the disc
    if d <= 9.5 && ((dx - dy).abs() <= 2.0 || (dx + dy).abs() <= 2.0) {
        return Some(WHITE);
    }
    Some(ERROR_RED)
}

/// Yellow triangle with a black exclamation mark.
fn warning_pixel(x: i32, y: i32) -> Option<u32> {
    if y < 1 || y > 30 { return None; }
    let half = (y - 1) as f32 / 2.0 + 0.5; // half width at this row
    let dx = (x as f32 - 15.5).abs();
    if dx > half { return None; }
    if dx > half - 1.5 || y >= 29 { return Some(WARNING_RIM); }
    let in_bar = (14..=17).contains(&x) && (10..=21).contains(&y);
    let in_dot = (14..=17).contains(&x) && (24..=27).contains(&y);
    if in_bar || in_dot { Some(BLACK) } else { Some(WARNING_YELLOW) }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn icons_have_transparent_corners_and_solid_centers() {
        for icon in [Icon::Error, Icon::Warning] {
            assert_eq!(icon.pixel(0, 0), None);
            assert_eq!(icon.pixel(31, 0), None);
            assert_eq!(icon.pixel(-1, 5), None);
            assert_eq!(icon.pixel(5, ICON_SIZE), None);
        }
        assert_eq!(Icon::Error.pixel(15, 15), Some(WHITE));
        assert_eq!(Icon::Error.pixel(15, 5), Some(ERROR_RED));
        assert_eq!(Icon::Warning.pixel(15, 15), Some(BLACK));
        assert_eq!(Icon::Warning.pixel(15, 23), Some(WARNING_YELLOW));
    }
}
