// Core geometry + pixel types shared by the raster, the payloads and the window.

use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FrameBuffer {
    pub width: usize,      // surface width in pixels
    pub height: usize,     // surface height in pixels
    pub pixels: Vec<u32>,  // each entry is 0x00RRGGBB for minifb
}

impl FrameBuffer {
    /// A surface of the given size filled with one color.
    pub fn filled(width: usize, height: usize, color: u32) -> Self {
        Self { width, height, pixels: vec![color; width * height] }
    }

    #[inline]
    pub fn get(&self, x: i32, y: i32) -> Option<u32> {
        if x < 0 || y < 0 { return None; }
        let (x, y) = (x as usize, y as usize);
        if x >= self.width || y >= self.height { return None; }
        Some(self.pixels[y * self.width + x])
    }

    /// Write a pixel if (x,y) is inside bounds; out-of-bounds writes are dropped.
    #[inline]
    pub fn put(&mut self, x: i32, y: i32, color: u32) {
        if x < 0 || y < 0 { return; }
        let (x, y) = (x as usize, y as usize);
        if x >= self.width || y >= self.height { return; }
        self.pixels[y * self.width + x] = color;
    }

    pub fn bounds(&self) -> Rect {
        Rect::new(0, 0, self.width as i32, self.height as i32)
    }

    /// Copy out the part of `rect` that lies on this surface.
    /// Pixels outside the surface stay unreadable in the returned region.
    pub fn region(&self, rect: Rect) -> Region {
        let clipped = rect.normalized().intersect(self.bounds());
        let mut pixels = Vec::with_capacity((clipped.w * clipped.h).max(0) as usize);
        for y in clipped.y..clipped.y + clipped.h {
            let row = y as usize * self.width;
            let start = row + clipped.x as usize;
            pixels.extend_from_slice(&self.pixels[start..start + clipped.w as usize]);
        }
        Region { area: clipped, pixels }
    }
}

/// A detached copy of part of a surface, addressed in the surface's coordinates.
pub struct Region {
    area: Rect,
    pixels: Vec<u32>,
}

impl Region {
    #[inline]
    pub fn get(&self, x: i32, y: i32) -> Option<u32> {
        if !self.area.contains(x, y) { return None; }
        let dx = (x - self.area.x) as usize;
        let dy = (y - self.area.y) as usize;
        Some(self.pixels[dy * self.area.w as usize + dx])
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    pub const fn new(x: i32, y: i32) -> Self { Self { x, y } }
}

/// Signed rectangle; width/height may be zero or negative (then it covers nothing).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub w: i32,
    pub h: i32,
}

impl Rect {
    pub const fn new(x: i32, y: i32, w: i32, h: i32) -> Self { Self { x, y, w, h } }

    pub fn is_empty(&self) -> bool { self.w <= 0 || self.h <= 0 }

    /// Empty rects collapse to zero size at their origin.
    pub fn normalized(self) -> Self {
        Self { w: self.w.max(0), h: self.h.max(0), ..self }
    }

    pub fn intersect(self, other: Rect) -> Rect {
        let x0 = self.x.max(other.x);
        let y0 = self.y.max(other.y);
        let x1 = self.x.saturating_add(self.w).min(other.x.saturating_add(other.w));
        let y1 = self.y.saturating_add(self.h).min(other.y.saturating_add(other.h));
        Rect::new(x0, y0, x1.saturating_sub(x0).max(0), y1.saturating_sub(y0).max(0))
    }

    #[inline]
    pub fn contains(&self, x: i32, y: i32) -> bool {
        x >= self.x && y >= self.y && x < self.x + self.w && y < self.y + self.h
    }
}

/// 24-bit solid color (brush color).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const WHITE: Rgb = Rgb { r: 255, g: 255, b: 255 };

    pub const fn new(r: u8, g: u8, b: u8) -> Self { Self { r, g, b } }

    /// Pack as 0x00RRGGBB.
    #[inline]
    pub fn to_pixel(self) -> u32 {
        ((self.r as u32) << 16) | ((self.g as u32) << 8) | self.b as u32
    }

    #[inline]
    pub fn from_pixel(px: u32) -> Self {
        Self::new(((px >> 16) & 0xFF) as u8, ((px >> 8) & 0xFF) as u8, (px & 0xFF) as u8)
    }
}
