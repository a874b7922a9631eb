// The payload library: stateless screen transforms.
// Each one acquires a screen DC (plus an off-screen copy when it must read
// before it writes), does one or two block transfers, and hands every
// handle back before returning. `None` from `run` means "skipped": some
// handle could not be acquired, so nothing (or nothing more) was drawn.

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::gdi::{Bitmap, Brush, Gdi, Hdc, MemoryDc, ScreenDc, Selection};
use crate::icons::Icon;
use crate::types::{Point, Rect, Rgb};

/// Constant source alpha used by Blur (out of 255).
pub const BLUR_ALPHA: u8 = 70;
/// Puzzle keeps block origins this far away from the right/bottom edge.
pub const PUZZLE_MARGIN: i32 = 100;

/// Largest accepted sampling bound, in pixels.
pub const MAX_BOUND: i32 = 1 << 16;

/// Uniform draw from `lo..hi`; an empty range yields `lo`.
pub fn range<R: Rng + ?Sized>(rng: &mut R, lo: i32, hi: i32) -> i32 {
    if hi <= lo { lo } else { rng.random_range(lo..hi) }
}

pub fn random_color<R: Rng + ?Sized>(rng: &mut R) -> Rgb {
    Rgb::new(rng.random(), rng.random(), rng.random())
}

/// Parameter bounds for one dispatch-table entry. Sampled fresh on every firing.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum PayloadSpec {
    /// Random rect at (rand W/2, rand H/2) sized (rand W, rand H).
    Invert,
    /// Destination jittered by `-jitter..jitter` on each axis.
    Blur { jitter: i32 },
    Melt { min_width: i32, max_width: i32, max_shift: i32 },
    /// strength = W / divisor, jiggle = H / divisor.
    Tunnel { divisor: i32, invert: bool, rainbow: bool },
    Pixellize { max_block: i32 },
    DrawError { cursor: bool, error: bool },
    Puzzle { bound: i32 },
    Rotate { max_amount: i32 },
}

impl PayloadSpec {
    /// Reject bounds that cannot be sampled; the message names the offending field.
    pub fn validate(&self) -> Result<(), String> {
        let bounded = |name: &str, v: i32, min: i32| {
            if (min..=MAX_BOUND).contains(&v) {
                Ok(())
            } else {
                Err(format!("{name} = {v} is outside {min}..={MAX_BOUND}"))
            }
        };
        match *self {
            PayloadSpec::Invert | PayloadSpec::DrawError { .. } => Ok(()),
            PayloadSpec::Blur { jitter } => bounded("jitter", jitter, 0),
            PayloadSpec::Melt { min_width, max_width, max_shift } => {
                bounded("min_width", min_width, 0)?;
                bounded("max_width", max_width, 0)?;
                bounded("max_shift", max_shift, 0)?;
                if min_width > max_width {
                    return Err(format!("min_width {min_width} is above max_width {max_width}"));
                }
                Ok(())
            }
            PayloadSpec::Tunnel { divisor, .. } => bounded("divisor", divisor, 1),
            PayloadSpec::Pixellize { max_block } => bounded("max_block", max_block, 1),
            PayloadSpec::Puzzle { bound } => bounded("bound", bound, 0),
            PayloadSpec::Rotate { max_amount } => bounded("max_amount", max_amount, 0),
        }
    }

    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R, width: i32, height: i32) -> Payload {
        match *self {
            PayloadSpec::Invert => Payload::Invert {
                rect: Rect::new(
                    range(rng, 0, width / 2),
                    range(rng, 0, height / 2),
                    range(rng, 0, width),
                    range(rng, 0, height),
                ),
            },
            PayloadSpec::Blur { jitter } => Payload::Blur {
                dest: Rect::new(range(rng, jitter.saturating_neg(), jitter), range(rng, jitter.saturating_neg(), jitter), width, height),
                src: Rect::new(0, 0, width, height),
            },
            PayloadSpec::Melt { min_width, max_width, max_shift } => Payload::Melt {
                slice_width: range(rng, min_width, max_width),
                shift: range(rng, max_shift.saturating_neg(), max_shift),
            },
            PayloadSpec::Tunnel { divisor, invert, rainbow } => {
                let divisor = divisor.max(1);
                Payload::Tunnel { strength: width / divisor, jiggle: height / divisor, invert, rainbow }
            }
            PayloadSpec::Pixellize { max_block } => Payload::Pixellize { size: range(rng, 1, max_block.saturating_add(1)) },
            PayloadSpec::DrawError { cursor, error } => Payload::DrawError { cursor, error },
            PayloadSpec::Puzzle { bound } => Payload::Puzzle { bound },
            PayloadSpec::Rotate { max_amount } => Payload::Rotate {
                amount: range(rng, max_amount.saturating_neg(), max_amount),
                offset: Point::new(width / 100, height / 100),
                extra: Point::new(width / 50, height / 50),
            },
        }
    }
}

/// One concrete payload invocation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Payload {
    Invert { rect: Rect },
    Blur { dest: Rect, src: Rect },
    Melt { slice_width: i32, shift: i32 },
    Tunnel { strength: i32, jiggle: i32, invert: bool, rainbow: bool },
    Pixellize { size: i32 },
    DrawError { cursor: bool, error: bool },
    Puzzle { bound: i32 },
    Rotate { amount: i32, offset: Point, extra: Point },
}

impl Payload {
    pub fn name(&self) -> &'static str {
        match self {
            Payload::Invert { .. } => "invert",
            Payload::Blur { .. } => "blur",
            Payload::Melt { .. } => "melt",
            Payload::Tunnel { .. } => "tunnel",
            Payload::Pixellize { .. } => "pixellize",
            Payload::DrawError { .. } => "draw-error",
            Payload::Puzzle { .. } => "puzzle",
            Payload::Rotate { .. } => "rotate",
        }
    }

    /// Run against the screen of `gdi`. Randomness that the payload itself
    /// needs (slice position, brush color, jiggle...) comes from `rng`.
    pub fn run<G, R>(&self, gdi: &G, rng: &mut R) -> Option<()>
    where
        G: Gdi + ?Sized,
        R: Rng + ?Sized,
    {
        match *self {
            Payload::Invert { rect } => invert(gdi, rng, rect),
            Payload::Blur { dest, src } => blur(gdi, dest, src),
            Payload::Melt { slice_width, shift } => melt(gdi, rng, slice_width, shift),
            Payload::Tunnel { strength, jiggle, invert, rainbow } => {
                tunnel(gdi, rng, strength, jiggle, invert, rainbow)
            }
            Payload::Pixellize { size } => pixellize(gdi, size),
            Payload::DrawError { cursor, error } => draw_error(gdi, rng, cursor, error),
            Payload::Puzzle { bound } => puzzle(gdi, rng, bound),
            Payload::Rotate { amount, offset, extra } => rotate(gdi, amount, offset, extra),
        }
    }
}

/* ---------- Scoped helpers ---------- */

/// Memory DC with a screen-sized bitmap selected into it.
struct OffScreen<'g, G: Gdi + ?Sized> {
    // field order is drop order: deselect, delete bitmap, delete DC
    _selection: Selection<'g, G>,
    _bitmap: Bitmap<'g, G>,
    dc: MemoryDc<'g, G>,
}

impl<'g, G: Gdi + ?Sized> OffScreen<'g, G> {
    fn new(gdi: &'g G, screen: Hdc, width: i32, height: i32) -> Option<Self> {
        let dc = MemoryDc::compatible_with(gdi, screen)?;
        let bitmap = Bitmap::compatible_with(gdi, screen, width, height)?;
        let selection = Selection::select(gdi, dc.hdc(), bitmap.object())?;
        Some(Self { _selection: selection, _bitmap: bitmap, dc })
    }

    /// Off-screen copy of the whole screen.
    fn snapshot(gdi: &'g G, screen: Hdc, width: i32, height: i32) -> Option<Self> {
        let off = Self::new(gdi, screen, width, height)?;
        gdi.bit_blt(off.hdc(), Rect::new(0, 0, width, height), screen, Point::new(0, 0))
            .then_some(off)
    }

    fn hdc(&self) -> Hdc { self.dc.hdc() }
}

/// A solid brush selected into a DC for the lifetime of the guard.
struct Tint<'g, G: Gdi + ?Sized> {
    _selection: Selection<'g, G>,
    _brush: Brush<'g, G>,
}

impl<'g, G: Gdi + ?Sized> Tint<'g, G> {
    fn new(gdi: &'g G, hdc: Hdc, color: Rgb) -> Option<Self> {
        let brush = Brush::solid(gdi, color)?;
        let selection = Selection::select(gdi, hdc, brush.object())?;
        Some(Self { _selection: selection, _brush: brush })
    }
}

/* ---------- Payloads ---------- */

/// XOR a random solid color over `rect`.
pub fn invert<G: Gdi + ?Sized, R: Rng + ?Sized>(gdi: &G, rng: &mut R, rect: Rect) -> Option<()> {
    let dc = ScreenDc::acquire(gdi)?;
    let _tint = Tint::new(gdi, dc.hdc(), random_color(rng))?;
    gdi.pat_invert(dc.hdc(), rect).then_some(())
}

/// Blend a copy of the screen back over `dest` at BLUR_ALPHA.
pub fn blur<G: Gdi + ?Sized>(gdi: &G, dest: Rect, src: Rect) -> Option<()> {
    let (w, h) = gdi.screen_size();
    let dc = ScreenDc::acquire(gdi)?;
    let off = OffScreen::snapshot(gdi, dc.hdc(), w, h)?;
    gdi.alpha_blend(dc.hdc(), dest, off.hdc(), src, BLUR_ALPHA).then_some(())
}

/// Drag a full-height vertical slice at a random column down (or up) by `shift` rows.
pub fn melt<G: Gdi + ?Sized, R: Rng + ?Sized>(gdi: &G, rng: &mut R, slice_width: i32, shift: i32) -> Option<()> {
    let (w, h) = gdi.screen_size();
    let dc = ScreenDc::acquire(gdi)?;
    let x = range(rng, 0, w);
    gdi.bit_blt(dc.hdc(), Rect::new(x, shift, slice_width, h), dc.hdc(), Point::new(x, 0))
        .then_some(())
}

/// Redraw the screen shrunk by `strength ± jiggle` on each side.
/// With `invert`, the snapshot is taken between two pattern inversions of the
/// screen; with `rainbow` as well, the second inversion uses a random brush.
pub fn tunnel<G: Gdi + ?Sized, R: Rng + ?Sized>(
    gdi: &G,
    rng: &mut R,
    strength: i32,
    jiggle: i32,
    invert: bool,
    rainbow: bool,
) -> Option<()> {
    let (w, h) = gdi.screen_size();
    let full = Rect::new(0, 0, w, h);
    let dc = ScreenDc::acquire(gdi)?;
    let off = OffScreen::new(gdi, dc.hdc(), w, h)?;

    let copied = if invert {
        gdi.pat_invert(dc.hdc(), full);
        // no brush is fine: the restore then uses the stock one
        let _tint = if rainbow { Tint::new(gdi, dc.hdc(), random_color(rng)) } else { None };
        let copied = gdi.bit_blt(off.hdc(), full, dc.hdc(), Point::new(0, 0));
        // the second inversion runs even when the copy failed
        gdi.pat_invert(dc.hdc(), full);
        copied
    } else {
        gdi.bit_blt(off.hdc(), full, dc.hdc(), Point::new(0, 0))
    };
    // never stretch an empty bitmap over the screen
    copied.then_some(())?;

    let inset = Rect::new(
        strength + range(rng, jiggle.saturating_neg(), jiggle),
        strength + range(rng, jiggle.saturating_neg(), jiggle),
        w - strength * 2,
        h - strength * 2,
    );
    gdi.stretch_blt(dc.hdc(), inset, off.hdc(), full).then_some(())
}

/// Blocky aliasing: stretch a 1/size copy of the screen back to full size.
pub fn pixellize<G: Gdi + ?Sized>(gdi: &G, size: i32) -> Option<()> {
    let size = size.max(1);
    let (w, h) = gdi.screen_size();
    let dc = ScreenDc::acquire(gdi)?;
    let off = OffScreen::snapshot(gdi, dc.hdc(), w, h)?;
    gdi.stretch_blt(dc.hdc(), Rect::new(0, 0, w, h), off.hdc(), Rect::new(0, 0, w / size, h / size))
        .then_some(())
}

/// Stamp the error (or warning) icon at the pointer or somewhere random.
pub fn draw_error<G: Gdi + ?Sized, R: Rng + ?Sized>(gdi: &G, rng: &mut R, cursor: bool, error: bool) -> Option<()> {
    let (w, h) = gdi.screen_size();
    let icon = if error { Icon::Error } else { Icon::Warning };
    let at = if cursor {
        gdi.cursor_pos()?
    } else {
        Point::new(range(rng, 0, w), range(rng, 0, h))
    };
    let dc = ScreenDc::acquire(gdi)?;
    gdi.draw_icon(dc.hdc(), at, icon).then_some(())
}

/// Pick the destination block and the source origin for one Puzzle step.
/// Both origins stay in `[0, W-100) × [0, H-100)`; None when the screen is too small.
pub fn puzzle_blocks<R: Rng + ?Sized>(rng: &mut R, width: i32, height: i32, bound: i32) -> Option<(Rect, Point)> {
    if width <= PUZZLE_MARGIN || height <= PUZZLE_MARGIN { return None; }
    let dest = Point::new(range(rng, 0, width - PUZZLE_MARGIN), range(rng, 0, height - PUZZLE_MARGIN));
    let src = Point::new(range(rng, 0, width - PUZZLE_MARGIN), range(rng, 0, height - PUZZLE_MARGIN));
    let size = (range(rng, 0, bound), range(rng, 0, bound));
    Some((Rect::new(dest.x, dest.y, size.0, size.1), src))
}

/// Copy a random block of the screen somewhere else.
pub fn puzzle<G: Gdi + ?Sized, R: Rng + ?Sized>(gdi: &G, rng: &mut R, bound: i32) -> Option<()> {
    let (w, h) = gdi.screen_size();
    let (dest, src) = puzzle_blocks(rng, w, h, bound)?;
    let dc = ScreenDc::acquire(gdi)?;
    gdi.bit_blt(dc.hdc(), dest, dc.hdc(), src).then_some(())
}

/// Sheared copy of the screen that approximates a small rotation.
pub fn rotate<G: Gdi + ?Sized>(gdi: &G, amount: i32, offset: Point, extra: Point) -> Option<()> {
    let (w, h) = gdi.screen_size();
    let dc = ScreenDc::acquire(gdi)?;
    let off = OffScreen::snapshot(gdi, dc.hdc(), w, h)?;
    // no clamping: a huge amount just yields a degenerate or off-screen parallelogram
    let points = [
        Point::new(amount, amount.saturating_neg()),
        Point::new(w.saturating_add(amount), amount),
        Point::new(amount.saturating_neg(), h.saturating_sub(amount)),
    ];
    let src = Rect::new(
        offset.x.saturating_neg(),
        offset.y.saturating_neg(),
        w.saturating_add(extra.x),
        h.saturating_add(extra.y),
    );
    gdi.plg_blt(dc.hdc(), points, off.hdc(), src).then_some(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gdi::GdiObject;
    use crate::raster::{RasterGdi, ResourceKind};
    use crate::types::FrameBuffer;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    const W: usize = 240;
    const H: usize = 180;

    fn screen() -> FrameBuffer {
        let mut fb = FrameBuffer::filled(W, H, 0);
        for y in 0..H {
            for x in 0..W {
                fb.pixels[y * W + x] = ((x as u32 & 0xFF) << 16) | ((y as u32 & 0xFF) << 8) | 0x80;
            }
        }
        fb
    }

    fn every_payload() -> Vec<Payload> {
        vec![
            Payload::Invert { rect: Rect::new(10, 10, 50, 50) },
            Payload::Blur { dest: Rect::new(1, -1, W as i32, H as i32), src: Rect::new(0, 0, W as i32, H as i32) },
            Payload::Melt { slice_width: 40, shift: 7 },
            Payload::Tunnel { strength: 4, jiggle: 3, invert: false, rainbow: false },
            Payload::Tunnel { strength: 2, jiggle: 1, invert: true, rainbow: true },
            Payload::Pixellize { size: 6 },
            Payload::DrawError { cursor: true, error: true },
            Payload::DrawError { cursor: false, error: false },
            Payload::Puzzle { bound: 80 },
            Payload::Rotate { amount: 12, offset: Point::new(2, 1), extra: Point::new(4, 3) },
        ]
    }

    #[test]
    fn every_payload_releases_all_handles() {
        let gdi = RasterGdi::new(screen());
        gdi.set_cursor(Some(Point::new(20, 30)));
        let mut rng = StdRng::seed_from_u64(7);
        for p in every_payload() {
            assert!(p.run(&gdi, &mut rng).is_some(), "{} should have run", p.name());
            assert_eq!(gdi.outstanding_handles(), 0, "{} leaked handles", p.name());
        }
    }

    #[test]
    fn acquisition_failures_skip_without_leaking() {
        for kind in [ResourceKind::ScreenDc, ResourceKind::MemoryDc, ResourceKind::Bitmap, ResourceKind::Brush] {
            let gdi = RasterGdi::new(screen());
            gdi.set_cursor(Some(Point::new(5, 5)));
            gdi.fail(kind);
            let mut rng = StdRng::seed_from_u64(11);
            for p in every_payload() {
                let _ = p.run(&gdi, &mut rng);
                assert_eq!(gdi.outstanding_handles(), 0, "{} leaked with {kind:?} failing", p.name());
            }
        }
    }

    #[test]
    fn off_screen_payloads_skip_when_bitmaps_fail() {
        let original = screen();
        let gdi = RasterGdi::new(original.clone());
        gdi.fail(ResourceKind::Bitmap);
        let mut rng = StdRng::seed_from_u64(3);
        assert!(pixellize(&gdi, 5).is_none());
        assert!(rotate(&gdi, 10, Point::new(1, 1), Point::new(2, 2)).is_none());
        assert!(tunnel(&gdi, &mut rng, 3, 1, true, false).is_none());
        gdi.with_screen(|fb| assert_eq!(fb, &original));
    }

    #[test]
    fn puzzle_origins_stay_inside_margin() {
        let mut rng = StdRng::seed_from_u64(42);
        let (w, h) = (640, 480);
        for _ in 0..2000 {
            let (dest, src) = puzzle_blocks(&mut rng, w, h, 500).unwrap();
            for (x, y) in [(dest.x, dest.y), (src.x, src.y)] {
                assert!((0..w - PUZZLE_MARGIN).contains(&x), "x={x}");
                assert!((0..h - PUZZLE_MARGIN).contains(&y), "y={y}");
            }
            assert!((0..500).contains(&dest.w) && (0..500).contains(&dest.h));
        }
        assert!(puzzle_blocks(&mut rng, 100, 480, 500).is_none());
    }

    #[test]
    fn tunnel_invert_restores_screen_parity_and_snapshots_inverted() {
        let original = screen();
        let gdi = RasterGdi::new(original.clone());
        let mut rng = StdRng::seed_from_u64(1);
        let strength = 30;
        tunnel(&gdi, &mut rng, strength, 0, true, false).unwrap();
        assert_eq!(gdi.pattern_inverts(), 2);
        gdi.with_screen(|fb| {
            // border outside the shrunken copy: untouched after both inversions
            assert_eq!(fb.get(0, 0), original.get(0, 0));
            assert_eq!(fb.get(W as i32 - 1, H as i32 - 1), original.get(W as i32 - 1, H as i32 - 1));
            // inside: the inverted snapshot, scaled down
            let (dw, dh) = (W as i32 - 2 * strength, H as i32 - 2 * strength);
            let (x, y) = (strength + dw / 2, strength + dh / 2);
            let sx = (x - strength) * W as i32 / dw;
            let sy = (y - strength) * H as i32 / dh;
            assert_eq!(fb.get(x, y), original.get(sx, sy).map(|p| p ^ 0x00FF_FFFF));
        });
        assert_eq!(gdi.outstanding_handles(), 0);
    }

    #[test]
    fn tunnel_without_invert_never_touches_pattern() {
        let gdi = RasterGdi::new(screen());
        let mut rng = StdRng::seed_from_u64(1);
        tunnel(&gdi, &mut rng, 5, 5, false, true).unwrap();
        assert_eq!(gdi.pattern_inverts(), 0);
    }

    #[test]
    fn pixellize_clamps_block_size() {
        let original = screen();
        let gdi = RasterGdi::new(original.clone());
        // size 0 behaves like 1: a full-size copy onto itself
        pixellize(&gdi, 0).unwrap();
        gdi.with_screen(|fb| assert_eq!(fb, &original));
        pixellize(&gdi, 10).unwrap();
        gdi.with_screen(|fb| {
            assert_eq!(fb.get(0, 0), fb.get(9, 9));
            assert_eq!(fb.get(10, 0), fb.get(19, 9));
        });
    }

    #[test]
    fn melt_past_the_bottom_is_a_clipped_no_op() {
        let original = screen();
        let gdi = RasterGdi::new(original.clone());
        let mut rng = StdRng::seed_from_u64(5);
        melt(&gdi, &mut rng, 50, H as i32 + 10).unwrap();
        gdi.with_screen(|fb| assert_eq!(fb, &original));
    }

    #[test]
    fn invert_only_touches_its_rect() {
        let original = screen();
        let gdi = RasterGdi::new(original.clone());
        let mut rng = StdRng::seed_from_u64(9);
        invert(&gdi, &mut rng, Rect::new(10, 10, 20, 20)).unwrap();
        gdi.with_screen(|fb| {
            assert_eq!(fb.get(9, 9), original.get(9, 9));
            assert_eq!(fb.get(30, 30), original.get(30, 30));
            let mask = fb.get(10, 10).unwrap() ^ original.get(10, 10).unwrap();
            assert_eq!(fb.get(29, 29).unwrap() ^ original.get(29, 29).unwrap(), mask);
        });
    }

    #[test]
    fn rotate_by_zero_is_identity() {
        let original = screen();
        let gdi = RasterGdi::new(original.clone());
        rotate(&gdi, 0, Point::new(0, 0), Point::new(0, 0)).unwrap();
        gdi.with_screen(|fb| assert_eq!(fb, &original));
    }

    #[test]
    fn draw_error_at_cursor_needs_a_cursor() {
        let gdi = RasterGdi::new(screen());
        let mut rng = StdRng::seed_from_u64(2);
        assert!(draw_error(&gdi, &mut rng, true, true).is_none());
        gdi.set_cursor(Some(Point::new(50, 60)));
        draw_error(&gdi, &mut rng, true, false).unwrap();
        gdi.with_screen(|fb| assert_eq!(fb.get(50 + 15, 60 + 15), Icon::Warning.pixel(15, 15)));
        assert_eq!(gdi.outstanding_handles(), 0);
    }

    #[test]
    fn sampling_respects_bounds() {
        let mut rng = StdRng::seed_from_u64(99);
        for _ in 0..500 {
            match (PayloadSpec::Melt { min_width: 50, max_width: 500, max_shift: 10 }).sample(&mut rng, 800, 600) {
                Payload::Melt { slice_width, shift } => {
                    assert!((50..500).contains(&slice_width));
                    assert!((-10..10).contains(&shift));
                }
                other => panic!("unexpected {other:?}"),
            }
            match PayloadSpec::Invert.sample(&mut rng, 800, 600) {
                Payload::Invert { rect } => {
                    assert!((0..400).contains(&rect.x) && (0..300).contains(&rect.y));
                    assert!((0..800).contains(&rect.w) && (0..600).contains(&rect.h));
                }
                other => panic!("unexpected {other:?}"),
            }
        }
        assert_eq!(
            (PayloadSpec::Tunnel { divisor: 50, invert: false, rainbow: false }).sample(&mut rng, 800, 600),
            Payload::Tunnel { strength: 16, jiggle: 12, invert: false, rainbow: false }
        );
    }
    #[test]
    fn rotate_with_a_huge_amount_is_a_harmless_artifact() {
        let gdi = RasterGdi::new(screen());
        for amount in [1_100_000_000, i32::MAX, i32::MIN] {
            let _ = rotate(&gdi, amount, Point::new(3, 2), Point::new(6, 4));
            assert_eq!(gdi.outstanding_handles(), 0);
        }
        let _ = rotate(&gdi, 5, Point::new(i32::MIN, i32::MIN), Point::new(i32::MAX, i32::MAX));
        assert_eq!(gdi.outstanding_handles(), 0);
    }

    #[test]
    fn extreme_specs_sample_without_overflow() {
        let mut rng = StdRng::seed_from_u64(4);
        for spec in [
            PayloadSpec::Blur { jitter: i32::MIN },
            PayloadSpec::Melt { min_width: 0, max_width: 10, max_shift: i32::MIN },
            PayloadSpec::Pixellize { max_block: i32::MAX },
            PayloadSpec::Rotate { max_amount: i32::MIN },
        ] {
            assert!(spec.validate().is_err(), "{spec:?}");
            let _ = spec.sample(&mut rng, W as i32, H as i32);
        }
    }

    #[test]
    fn spec_validation_checks_each_bound() {
        assert!(PayloadSpec::Invert.validate().is_ok());
        assert!((PayloadSpec::Blur { jitter: 2 }).validate().is_ok());
        assert!((PayloadSpec::Blur { jitter: -1 }).validate().is_err());
        assert!((PayloadSpec::Melt { min_width: 500, max_width: 50, max_shift: 10 }).validate().is_err());
        assert!((PayloadSpec::Pixellize { max_block: 0 }).validate().is_err());
        assert!((PayloadSpec::Tunnel { divisor: 0, invert: false, rainbow: false }).validate().is_err());
        assert!((PayloadSpec::Puzzle { bound: MAX_BOUND + 1 }).validate().is_err());
        assert!((PayloadSpec::Rotate { max_amount: 100 }).validate().is_ok());
    }

    /// Delegates to a RasterGdi but refuses every BitBlt.
    struct NoBitBlt(RasterGdi);

    impl Gdi for NoBitBlt {
        fn screen_size(&self) -> (i32, i32) { self.0.screen_size() }
        fn cursor_pos(&self) -> Option<Point> { self.0.cursor_pos() }
        fn get_dc(&self) -> Option<Hdc> { self.0.get_dc() }
        fn release_dc(&self, hdc: Hdc) -> bool { self.0.release_dc(hdc) }
        fn create_compatible_dc(&self, hdc: Hdc) -> Option<Hdc> { self.0.create_compatible_dc(hdc) }
        fn delete_dc(&self, hdc: Hdc) -> bool { self.0.delete_dc(hdc) }
        fn create_compatible_bitmap(&self, hdc: Hdc, w: i32, h: i32) -> Option<crate::gdi::HBitmap> {
            self.0.create_compatible_bitmap(hdc, w, h)
        }
        fn create_solid_brush(&self, color: Rgb) -> Option<crate::gdi::HBrush> { self.0.create_solid_brush(color) }
        fn select_object(&self, hdc: Hdc, object: GdiObject) -> Option<GdiObject> { self.0.select_object(hdc, object) }
        fn delete_object(&self, object: GdiObject) -> bool { self.0.delete_object(object) }
        fn pat_invert(&self, hdc: Hdc, rect: Rect) -> bool { self.0.pat_invert(hdc, rect) }
        fn bit_blt(&self, _: Hdc, _: Rect, _: Hdc, _: Point) -> bool { false }
        fn stretch_blt(&self, dst: Hdc, dst_rect: Rect, src: Hdc, src_rect: Rect) -> bool {
            self.0.stretch_blt(dst, dst_rect, src, src_rect)
        }
        fn alpha_blend(&self, dst: Hdc, dst_rect: Rect, src: Hdc, src_rect: Rect, alpha: u8) -> bool {
            self.0.alpha_blend(dst, dst_rect, src, src_rect, alpha)
        }
        fn plg_blt(&self, dst: Hdc, points: [Point; 3], src: Hdc, src_rect: Rect) -> bool {
            self.0.plg_blt(dst, points, src, src_rect)
        }
        fn draw_icon(&self, hdc: Hdc, at: Point, icon: Icon) -> bool { self.0.draw_icon(hdc, at, icon) }
    }

    #[test]
    fn tunnel_skips_when_the_snapshot_copy_fails() {
        let original = screen();
        let gdi = NoBitBlt(RasterGdi::new(original.clone()));
        let mut rng = StdRng::seed_from_u64(6);
        assert!(tunnel(&gdi, &mut rng, 10, 2, false, false).is_none());
        assert!(tunnel(&gdi, &mut rng, 10, 2, true, false).is_none());
        // both inversions still ran, so the screen is back where it started
        assert_eq!(gdi.0.pattern_inverts(), 2);
        gdi.0.with_screen(|fb| assert_eq!(fb, &original));
        assert_eq!(gdi.0.outstanding_handles(), 0);
    }
}
