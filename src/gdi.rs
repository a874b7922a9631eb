//! Graphics capability used by the payloads.
//!
//! The trait mirrors the handful of GDI calls the effects need: device
//! contexts, bitmaps, brushes, and a few block-transfer primitives. Calls
//! report failure through `None`/`false` sentinels and never panic, so a
//! payload can simply skip its work when a handle is unavailable.
//!
//! Handles are released through the scoped guards at the bottom of this
//! file. Declare guards in acquisition order; Rust drops them in reverse,
//! which is the order GDI wants (restore selection, delete object, delete DC,
//! release screen DC).

use std::num::NonZeroU32;

use crate::icons::Icon;
use crate::types::{Point, Rect, Rgb};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Hdc(pub NonZeroU32);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct HBitmap(pub NonZeroU32);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct HBrush(pub NonZeroU32);

/// Anything that can be selected into a device context.
/// The stock variants are what a fresh DC starts with; they are never deleted.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GdiObject {
    Bitmap(HBitmap),
    Brush(HBrush),
    StockBitmap,
    StockBrush,
}

pub trait Gdi {
    /// Size of the screen surface in pixels.
    fn screen_size(&self) -> (i32, i32);
    /// Pointer position in screen coordinates, if the pointer is known.
    fn cursor_pos(&self) -> Option<Point>;

    fn get_dc(&self) -> Option<Hdc>;
    fn release_dc(&self, hdc: Hdc) -> bool;
    fn create_compatible_dc(&self, hdc: Hdc) -> Option<Hdc>;
    fn delete_dc(&self, hdc: Hdc) -> bool;
    fn create_compatible_bitmap(&self, hdc: Hdc, width: i32, height: i32) -> Option<HBitmap>;
    fn create_solid_brush(&self, color: Rgb) -> Option<HBrush>;
    /// Select `object` into `hdc`, returning the object of the same kind it replaced.
    fn select_object(&self, hdc: Hdc, object: GdiObject) -> Option<GdiObject>;
    /// Fails (returns false) while the object is selected into any DC.
    fn delete_object(&self, object: GdiObject) -> bool;

    /// PATINVERT: XOR the selected brush over `rect`.
    fn pat_invert(&self, hdc: Hdc, rect: Rect) -> bool;
    /// SRCCOPY block transfer of `dst.w × dst.h` pixels from `src_origin`.
    fn bit_blt(&self, dst: Hdc, dst_rect: Rect, src: Hdc, src_origin: Point) -> bool;
    fn stretch_blt(&self, dst: Hdc, dst_rect: Rect, src: Hdc, src_rect: Rect) -> bool;
    /// Constant-alpha source-over blend (`alpha` out of 255), stretching as needed.
    fn alpha_blend(&self, dst: Hdc, dst_rect: Rect, src: Hdc, src_rect: Rect, alpha: u8) -> bool;
    /// Map `src_rect` onto the parallelogram given by its upper-left,
    /// upper-right and lower-left destination corners.
    fn plg_blt(&self, dst: Hdc, points: [Point; 3], src: Hdc, src_rect: Rect) -> bool;
    fn draw_icon(&self, hdc: Hdc, at: Point, icon: Icon) -> bool;
}

/* ---------- Scoped handles ---------- */

/// Screen device context; released on drop.
pub struct ScreenDc<'g, G: Gdi + ?Sized> {
    gdi: &'g G,
    hdc: Hdc,
}

impl<'g, G: Gdi + ?Sized> ScreenDc<'g, G> {
    pub fn acquire(gdi: &'g G) -> Option<Self> {
        gdi.get_dc().map(|hdc| Self { gdi, hdc })
    }

    pub fn hdc(&self) -> Hdc { self.hdc }
}

impl<G: Gdi + ?Sized> Drop for ScreenDc<'_, G> {
    fn drop(&mut self) {
        if !self.gdi.release_dc(self.hdc) {
            log::warn!("release_dc({:?}) failed", self.hdc);
        }
    }
}

/// Memory (off-screen) device context compatible with another DC; deleted on drop.
pub struct MemoryDc<'g, G: Gdi + ?Sized> {
    gdi: &'g G,
    hdc: Hdc,
}

impl<'g, G: Gdi + ?Sized> MemoryDc<'g, G> {
    pub fn compatible_with(gdi: &'g G, hdc: Hdc) -> Option<Self> {
        gdi.create_compatible_dc(hdc).map(|hdc| Self { gdi, hdc })
    }

    pub fn hdc(&self) -> Hdc { self.hdc }
}

impl<G: Gdi + ?Sized> Drop for MemoryDc<'_, G> {
    fn drop(&mut self) {
        if !self.gdi.delete_dc(self.hdc) {
            log::warn!("delete_dc({:?}) failed", self.hdc);
        }
    }
}

pub struct Bitmap<'g, G: Gdi + ?Sized> {
    gdi: &'g G,
    handle: HBitmap,
}

impl<'g, G: Gdi + ?Sized> Bitmap<'g, G> {
    pub fn compatible_with(gdi: &'g G, hdc: Hdc, width: i32, height: i32) -> Option<Self> {
        gdi.create_compatible_bitmap(hdc, width, height).map(|handle| Self { gdi, handle })
    }

    pub fn object(&self) -> GdiObject { GdiObject::Bitmap(self.handle) }
}

impl<G: Gdi + ?Sized> Drop for Bitmap<'_, G> {
    fn drop(&mut self) {
        if !self.gdi.delete_object(self.object()) {
            log::warn!("delete_object({:?}) failed", self.handle);
        }
    }
}

pub struct Brush<'g, G: Gdi + ?Sized> {
    gdi: &'g G,
    handle: HBrush,
}

impl<'g, G: Gdi + ?Sized> Brush<'g, G> {
    pub fn solid(gdi: &'g G, color: Rgb) -> Option<Self> {
        gdi.create_solid_brush(color).map(|handle| Self { gdi, handle })
    }

    pub fn object(&self) -> GdiObject { GdiObject::Brush(self.handle) }
}

impl<G: Gdi + ?Sized> Drop for Brush<'_, G> {
    fn drop(&mut self) {
        if !self.gdi.delete_object(self.object()) {
            log::warn!("delete_object({:?}) failed", self.handle);
        }
    }
}

/// An object selected into a DC; the previous object is put back on drop.
/// Must be declared after the object guard so it drops first.
pub struct Selection<'g, G: Gdi + ?Sized> {
    gdi: &'g G,
    hdc: Hdc,
    previous: GdiObject,
}

impl<'g, G: Gdi + ?Sized> Selection<'g, G> {
    pub fn select(gdi: &'g G, hdc: Hdc, object: GdiObject) -> Option<Self> {
        gdi.select_object(hdc, object).map(|previous| Self { gdi, hdc, previous })
    }
}

impl<G: Gdi + ?Sized> Drop for Selection<'_, G> {
    fn drop(&mut self) {
        if self.gdi.select_object(self.hdc, self.previous).is_none() {
            log::warn!("restoring {:?} into {:?} failed", self.previous, self.hdc);
        }
    }
}
