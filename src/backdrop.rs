// Produces the starting content of the screen surface and converts between
// `image` buffers and our 0x00RRGGBB FrameBuffer.

use std::path::Path;

use image::{RgbImage, imageops::FilterType};

use crate::config::Backdrop;
use crate::error::Error;
use crate::types::FrameBuffer;

pub fn load(backdrop: &Backdrop, width: usize, height: usize) -> Result<FrameBuffer, Error> {
    match backdrop {
        Backdrop::Pattern => Ok(test_pattern(width, height)),
        Backdrop::Image(path) => from_image_file(path, width, height),
        Backdrop::Camera(index) => from_camera(*index, width, height),
    }
}

/// Color bars over a dark grid: busy enough that every payload is visible.
pub fn test_pattern(width: usize, height: usize) -> FrameBuffer {
    const BARS: [u32; 7] = [
        0x00_C0_C0_C0, 0x00_C0_C0_00, 0x00_00_C0_C0, 0x00_00_C0_00,
        0x00_C0_00_C0, 0x00_C0_00_00, 0x00_00_00_C0,
    ];
    let mut fb = FrameBuffer::filled(width, height, 0);
    for y in 0..height {
        for x in 0..width {
            let px = if y < height * 2 / 3 {
                BARS[x * BARS.len() / width.max(1)]
            } else if x % 32 == 0 || y % 32 == 0 {
                0x00_60_60_60
            } else {
                let shade = (x * 255 / width.max(1)) as u32;
                (shade << 16) | (shade << 8) | shade
            };
            fb.pixels[y * width + x] = px;
        }
    }
    fb
}

pub fn from_image_file(path: &Path, width: usize, height: usize) -> Result<FrameBuffer, Error> {
    let img = image::open(path).map_err(|e| Error::Image(format!("{}: {e}", path.display())))?;
    let rgb = img.resize_exact(width as u32, height as u32, FilterType::Triangle).to_rgb8();
    log::info!("backdrop: {} scaled to {width}x{height}", path.display());
    Ok(rgb_to_framebuffer(&rgb))
}

/// Pack each RGB<u8> as 0x00RRGGBB.
pub fn rgb_to_framebuffer(img: &RgbImage) -> FrameBuffer {
    let (w, h) = img.dimensions();
    let mut pixels = Vec::with_capacity((w as usize) * (h as usize));
    for pixel in img.pixels() {
        let r = pixel[0] as u32;
        let g = pixel[1] as u32;
        let b = pixel[2] as u32;
        pixels.push((r << 16) | (g << 8) | b);
    }
    FrameBuffer { width: w as usize, height: h as usize, pixels }
}

pub fn framebuffer_to_rgb(fb: &FrameBuffer) -> RgbImage {
    RgbImage::from_fn(fb.width as u32, fb.height as u32, |x, y| {
        let px = fb.pixels[y as usize * fb.width + x as usize];
        image::Rgb([(px >> 16) as u8, (px >> 8) as u8, px as u8])
    })
}

/// Save the screen surface (format picked from the file extension).
pub fn save_screenshot(fb: &FrameBuffer, path: &Path) -> Result<(), Error> {
    framebuffer_to_rgb(fb)
        .save(path)
        .map_err(|e| Error::Image(format!("{}: {e}", path.display())))?;
    log::info!("screenshot saved to {}", path.display());
    Ok(())
}

#[cfg(feature = "camera")]
fn from_camera(index: u32, width: usize, height: usize) -> Result<FrameBuffer, Error> {
    use nokhwa::{
        Camera,
        pixel_format::RgbFormat,
        utils::{CameraIndex, RequestedFormat, RequestedFormatType},
    };

    // Ask for RGB frames at the best resolution the device offers.
    let req = RequestedFormat::new::<RgbFormat>(RequestedFormatType::AbsoluteHighestResolution);
    let mut cam = Camera::new(CameraIndex::Index(index), req)
        .map_err(|e| Error::CameraInit(format!("Create camera: {e}")))?;
    cam.open_stream()
        .map_err(|e| Error::CameraInit(format!("Open stream: {e}")))?;

    let frame = cam
        .frame()
        .map_err(|e| Error::CameraFrame(format!("Fetch frame: {e}")))?;
    let rgb = frame
        .decode_image::<RgbFormat>()
        .map_err(|e| Error::CameraFrame(format!("Decode RGB: {e}")))?;
    if let Err(e) = cam.stop_stream() {
        log::warn!("stopping camera stream: {e}");
    }

    // rebuild through raw bytes: nokhwa may link a different `image` release
    let (w, h) = rgb.dimensions();
    let frame = RgbImage::from_raw(w, h, rgb.into_raw())
        .ok_or_else(|| Error::CameraFrame("Decode RGB: short frame".into()))?;
    let scaled = image::imageops::resize(&frame, width as u32, height as u32, FilterType::Triangle);
    log::info!("backdrop: camera {index} frame scaled to {width}x{height}");
    Ok(rgb_to_framebuffer(&scaled))
}

#[cfg(not(feature = "camera"))]
fn from_camera(_index: u32, _width: usize, _height: usize) -> Result<FrameBuffer, Error> {
    Err(Error::CameraInit("built without the `camera` feature".into()))
}
