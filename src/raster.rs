// Software implementation of the graphics capability.
// The "screen" is a FrameBuffer that the window presents; memory DCs and
// bitmaps live in handle tables next to it. Handles are plain counters, so
// tests can check that every payload gives back what it took.

use std::cell::{Cell, RefCell};
use std::collections::{HashMap, HashSet};
use std::num::NonZeroU32;

use crate::gdi::{Gdi, GdiObject, HBitmap, HBrush, Hdc};
use crate::icons::{ICON_SIZE, Icon};
use crate::types::{FrameBuffer, Point, Rect, Region, Rgb};

/// Resource classes that can be made to fail on purpose.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    ScreenDc,
    MemoryDc,
    Bitmap,
    Brush,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum DcKind {
    Screen,
    Memory,
}

#[derive(Clone, Copy, Debug)]
struct DcState {
    kind: DcKind,
    bitmap: Option<HBitmap>, // None = stock 1x1 bitmap (nothing to draw on)
    brush: Option<HBrush>,   // None = stock white brush
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum SurfaceId {
    Screen,
    Bitmap(HBitmap),
}

struct RasterState {
    screen: FrameBuffer,
    dcs: HashMap<Hdc, DcState>,
    bitmaps: HashMap<HBitmap, FrameBuffer>,
    brushes: HashMap<HBrush, Rgb>,
    next_id: u32,
    failing: HashSet<ResourceKind>,
    pattern_inverts: usize,
}

impl RasterState {
    fn next_handle(&mut self) -> NonZeroU32 {
        self.next_id = self.next_id.wrapping_add(1).max(1);
        NonZeroU32::new(self.next_id).unwrap_or(NonZeroU32::MIN)
    }

    fn surface_of(&self, hdc: Hdc) -> Option<SurfaceId> {
        let dc = self.dcs.get(&hdc)?;
        match dc.kind {
            DcKind::Screen => Some(SurfaceId::Screen),
            DcKind::Memory => dc.bitmap.map(SurfaceId::Bitmap),
        }
    }

    fn surface(&self, id: SurfaceId) -> Option<&FrameBuffer> {
        match id {
            SurfaceId::Screen => Some(&self.screen),
            SurfaceId::Bitmap(b) => self.bitmaps.get(&b),
        }
    }

    fn surface_mut(&mut self, id: SurfaceId) -> Option<&mut FrameBuffer> {
        match id {
            SurfaceId::Screen => Some(&mut self.screen),
            SurfaceId::Bitmap(b) => self.bitmaps.get_mut(&b),
        }
    }

    /// Copy the readable pixels of `src_rect` out of the DC's surface so the
    /// destination can be written even when both are the same surface.
    fn read(&self, hdc: Hdc, src_rect: Rect) -> Option<Region> {
        let id = self.surface_of(hdc)?;
        Some(self.surface(id)?.region(src_rect))
    }

    fn is_selected(&self, object: GdiObject) -> bool {
        self.dcs.values().any(|dc| match object {
            GdiObject::Bitmap(b) => dc.bitmap == Some(b),
            GdiObject::Brush(b) => dc.brush == Some(b),
            _ => false,
        })
    }
}

pub struct RasterGdi {
    state: RefCell<RasterState>,
    cursor: Cell<Option<Point>>,
}

impl RasterGdi {
    pub fn new(screen: FrameBuffer) -> Self {
        Self {
            state: RefCell::new(RasterState {
                screen,
                dcs: HashMap::new(),
                bitmaps: HashMap::new(),
                brushes: HashMap::new(),
                next_id: 0,
                failing: HashSet::new(),
                pattern_inverts: 0,
            }),
            cursor: Cell::new(None),
        }
    }

    pub fn set_cursor(&self, pos: Option<Point>) {
        self.cursor.set(pos);
    }

    /// Borrow the live screen surface (e.g. to present it).
    pub fn with_screen<T>(&self, f: impl FnOnce(&FrameBuffer) -> T) -> T {
        f(&self.state.borrow().screen)
    }

    /// DCs + bitmaps + brushes currently alive.
    pub fn outstanding_handles(&self) -> usize {
        let s = self.state.borrow();
        s.dcs.len() + s.bitmaps.len() + s.brushes.len()
    }

    /// How many pattern-invert calls have touched the screen so far.
    pub fn pattern_inverts(&self) -> usize {
        self.state.borrow().pattern_inverts
    }

    /// Make every future acquisition of `kind` fail.
    #[cfg(test)]
    pub fn fail(&self, kind: ResourceKind) {
        self.state.borrow_mut().failing.insert(kind);
    }

    fn failing(&self, kind: ResourceKind) -> bool {
        self.state.borrow().failing.contains(&kind)
    }

    fn create_dc(&self, kind: DcKind) -> Option<Hdc> {
        let mut s = self.state.borrow_mut();
        let hdc = Hdc(s.next_handle());
        s.dcs.insert(hdc, DcState { kind, bitmap: None, brush: None });
        Some(hdc)
    }

    /// Shared body of stretch_blt/alpha_blend: nearest-neighbour mapping of
    /// `src_rect` onto `dst_rect`, combining pixels with `mix(src, dst)`.
    fn stretch_with(
        &self,
        dst: Hdc,
        dst_rect: Rect,
        src: Hdc,
        src_rect: Rect,
        mix: impl Fn(u32, u32) -> u32,
    ) -> bool {
        if dst_rect.is_empty() || src_rect.is_empty() { return false; }
        let mut s = self.state.borrow_mut();
        let Some(region) = s.read(src, src_rect) else { return false };
        let Some(dst_id) = s.surface_of(dst) else { return false };
        let Some(fb) = s.surface_mut(dst_id) else { return false };

        let visible = dst_rect.intersect(fb.bounds());
        for y in visible.y..visible.y + visible.h {
            let v = ((y as i64 - dst_rect.y as i64) * src_rect.h as i64 / dst_rect.h as i64) as i32;
            for x in visible.x..visible.x + visible.w {
                let u = ((x as i64 - dst_rect.x as i64) * src_rect.w as i64 / dst_rect.w as i64) as i32;
                if let Some(px) = region.get(src_rect.x.saturating_add(u), src_rect.y.saturating_add(v)) {
                    let idx = y as usize * fb.width + x as usize;
                    fb.pixels[idx] = mix(px, fb.pixels[idx]);
                }
            }
        }
        true
    }
}

/// Constant-alpha source-over on one 0x00RRGGBB pixel.
#[inline]
fn blend_pixel(src: u32, dst: u32, alpha: u8) -> u32 {
    let a = alpha as u32;
    let ch = |shift: u32| {
        let s = (src >> shift) & 0xFF;
        let d = (dst >> shift) & 0xFF;
        ((s * a + d * (255 - a) + 127) / 255) << shift
    };
    ch(16) | ch(8) | ch(0)
}

impl Gdi for RasterGdi {
    fn screen_size(&self) -> (i32, i32) {
        let s = self.state.borrow();
        (s.screen.width as i32, s.screen.height as i32)
    }

    fn cursor_pos(&self) -> Option<Point> {
        self.cursor.get()
    }

    fn get_dc(&self) -> Option<Hdc> {
        if self.failing(ResourceKind::ScreenDc) { return None; }
        self.create_dc(DcKind::Screen)
    }

    fn release_dc(&self, hdc: Hdc) -> bool {
        let mut s = self.state.borrow_mut();
        match s.dcs.get(&hdc) {
            Some(dc) if dc.kind == DcKind::Screen => s.dcs.remove(&hdc).is_some(),
            _ => false,
        }
    }

    fn create_compatible_dc(&self, hdc: Hdc) -> Option<Hdc> {
        if self.failing(ResourceKind::MemoryDc) { return None; }
        if !self.state.borrow().dcs.contains_key(&hdc) { return None; }
        self.create_dc(DcKind::Memory)
    }

    fn delete_dc(&self, hdc: Hdc) -> bool {
        let mut s = self.state.borrow_mut();
        match s.dcs.get(&hdc) {
            Some(dc) if dc.kind == DcKind::Memory => s.dcs.remove(&hdc).is_some(),
            _ => false,
        }
    }

    fn create_compatible_bitmap(&self, hdc: Hdc, width: i32, height: i32) -> Option<HBitmap> {
        if self.failing(ResourceKind::Bitmap) || width <= 0 || height <= 0 { return None; }
        let mut s = self.state.borrow_mut();
        if !s.dcs.contains_key(&hdc) { return None; }
        let handle = HBitmap(s.next_handle());
        s.bitmaps.insert(handle, FrameBuffer::filled(width as usize, height as usize, 0));
        Some(handle)
    }

    fn create_solid_brush(&self, color: Rgb) -> Option<HBrush> {
        if self.failing(ResourceKind::Brush) { return None; }
        let mut s = self.state.borrow_mut();
        let handle = HBrush(s.next_handle());
        s.brushes.insert(handle, color);
        Some(handle)
    }

    fn select_object(&self, hdc: Hdc, object: GdiObject) -> Option<GdiObject> {
        let mut s = self.state.borrow_mut();
        match object {
            GdiObject::Bitmap(b) if !s.bitmaps.contains_key(&b) => return None,
            GdiObject::Brush(b) if !s.brushes.contains_key(&b) => return None,
            _ => {}
        }
        let dc = s.dcs.get_mut(&hdc)?;
        match object {
            GdiObject::Bitmap(_) | GdiObject::StockBitmap => {
                // only memory DCs own a bitmap
                if dc.kind != DcKind::Memory { return None; }
                let new = match object { GdiObject::Bitmap(b) => Some(b), _ => None };
                let old = std::mem::replace(&mut dc.bitmap, new);
                Some(old.map_or(GdiObject::StockBitmap, GdiObject::Bitmap))
            }
            GdiObject::Brush(_) | GdiObject::StockBrush => {
                let new = match object { GdiObject::Brush(b) => Some(b), _ => None };
                let old = std::mem::replace(&mut dc.brush, new);
                Some(old.map_or(GdiObject::StockBrush, GdiObject::Brush))
            }
        }
    }

    fn delete_object(&self, object: GdiObject) -> bool {
        let mut s = self.state.borrow_mut();
        if s.is_selected(object) { return false; }
        match object {
            GdiObject::Bitmap(b) => s.bitmaps.remove(&b).is_some(),
            GdiObject::Brush(b) => s.brushes.remove(&b).is_some(),
            GdiObject::StockBitmap | GdiObject::StockBrush => false,
        }
    }

    fn pat_invert(&self, hdc: Hdc, rect: Rect) -> bool {
        let mut s = self.state.borrow_mut();
        let Some(dc) = s.dcs.get(&hdc).copied() else { return false };
        let pattern = match dc.brush {
            Some(b) => match s.brushes.get(&b) { Some(c) => c.to_pixel(), None => return false },
            None => Rgb::WHITE.to_pixel(),
        };
        let Some(id) = s.surface_of(hdc) else { return false };
        if id == SurfaceId::Screen { s.pattern_inverts += 1; }
        let Some(fb) = s.surface_mut(id) else { return false };

        let area = rect.normalized().intersect(fb.bounds());
        for y in area.y..area.y + area.h {
            let row = y as usize * fb.width;
            for px in &mut fb.pixels[row + area.x as usize..row + (area.x + area.w) as usize] {
                *px ^= pattern;
            }
        }
        true
    }

    fn bit_blt(&self, dst: Hdc, dst_rect: Rect, src: Hdc, src_origin: Point) -> bool {
        // an empty rect is a successful no-op, as long as both DCs are valid
        let src_rect = Rect::new(src_origin.x, src_origin.y, dst_rect.w, dst_rect.h);
        let mut s = self.state.borrow_mut();
        let Some(region) = s.read(src, src_rect) else { return false };
        let Some(dst_id) = s.surface_of(dst) else { return false };
        let Some(fb) = s.surface_mut(dst_id) else { return false };

        let (dx, dy) = (src_origin.x - dst_rect.x, src_origin.y - dst_rect.y);
        let visible = dst_rect.intersect(fb.bounds());
        for y in visible.y..visible.y + visible.h {
            for x in visible.x..visible.x + visible.w {
                if let Some(px) = region.get(x + dx, y + dy) {
                    fb.pixels[y as usize * fb.width + x as usize] = px;
                }
            }
        }
        true
    }

    fn stretch_blt(&self, dst: Hdc, dst_rect: Rect, src: Hdc, src_rect: Rect) -> bool {
        self.stretch_with(dst, dst_rect, src, src_rect, |s, _| s)
    }

    fn alpha_blend(&self, dst: Hdc, dst_rect: Rect, src: Hdc, src_rect: Rect, alpha: u8) -> bool {
        {
            // GDI refuses source rects that leave the source surface
            let s = self.state.borrow();
            let Some(fb) = s.surface_of(src).and_then(|id| s.surface(id)) else { return false };
            if src_rect.intersect(fb.bounds()) != src_rect { return false; }
        }
        self.stretch_with(dst, dst_rect, src, src_rect, |s, d| blend_pixel(s, d, alpha))
    }

    fn plg_blt(&self, dst: Hdc, points: [Point; 3], src: Hdc, src_rect: Rect) -> bool {
        if src_rect.is_empty() { return false; }
        let [p0, p1, p2] = points.map(|p| (p.x as f64, p.y as f64));
        let e1 = (p1.0 - p0.0, p1.1 - p0.1); // image of the top edge
        let e2 = (p2.0 - p0.0, p2.1 - p0.1); // image of the left edge
        let det = e1.0 * e2.1 - e1.1 * e2.0;
        if det.abs() < f64::EPSILON { return false; }

        let mut s = self.state.borrow_mut();
        let Some(region) = s.read(src, src_rect) else { return false };
        let Some(dst_id) = s.surface_of(dst) else { return false };
        let Some(fb) = s.surface_mut(dst_id) else { return false };

        // bounding box of the parallelogram, clipped to the destination in f64
        // so far-away corners cannot overflow i32
        let p3 = (p1.0 + e2.0, p1.1 + e2.1);
        let span = |v: [f64; 4], limit: usize| {
            let lo = v.iter().cloned().fold(f64::INFINITY, f64::min).floor().clamp(0.0, limit as f64);
            let hi = v.iter().cloned().fold(f64::NEG_INFINITY, f64::max).ceil().clamp(0.0, limit as f64);
            (lo as i32, (hi - lo).max(0.0) as i32)
        };
        let (vx, vw) = span([p0.0, p1.0, p2.0, p3.0], fb.width);
        let (vy, vh) = span([p0.1, p1.1, p2.1, p3.1], fb.height);
        let visible = Rect::new(vx, vy, vw, vh);

        for y in visible.y..visible.y + visible.h {
            for x in visible.x..visible.x + visible.w {
                let qx = x as f64 + 0.5 - p0.0;
                let qy = y as f64 + 0.5 - p0.1;
                let a = (qx * e2.1 - qy * e2.0) / det;
                let b = (e1.0 * qy - e1.1 * qx) / det;
                if !(0.0..1.0).contains(&a) || !(0.0..1.0).contains(&b) { continue; }
                let sx = src_rect.x.saturating_add((a * src_rect.w as f64) as i32);
                let sy = src_rect.y.saturating_add((b * src_rect.h as f64) as i32);
                if let Some(px) = region.get(sx, sy) {
                    fb.pixels[y as usize * fb.width + x as usize] = px;
                }
            }
        }
        true
    }

    fn draw_icon(&self, hdc: Hdc, at: Point, icon: Icon) -> bool {
        let mut s = self.state.borrow_mut();
        let Some(id) = s.surface_of(hdc) else { return false };
        let Some(fb) = s.surface_mut(id) else { return false };
        for iy in 0..ICON_SIZE {
            for ix in 0..ICON_SIZE {
                if let Some(px) = icon.pixel(ix, iy) {
                    fb.put(at.x + ix, at.y + iy, px);
                }
            }
        }
        true
    }
}
