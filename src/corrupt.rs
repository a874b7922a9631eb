// Image byte-corruption ("glitch") demo.
// The image is re-encoded as a 24-bit BMP, a stretch of bytes between the
// untouched header and tail is scrambled, and the result is decoded again.
// Because BMP stores raw rows, the damage shows up as shifted, tinted bands.

use std::io::Cursor;
use std::ops::Range;
use std::path::Path;

use clap::ValueEnum;
use image::{DynamicImage, ImageFormat};
use rand::Rng;

use crate::error::Error;

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum Method {
    /// Overwrite a run of bytes with random values.
    Random,
    /// Add a fixed offset to each byte of a run (wrapping modulo 0xFF).
    Offset,
}

#[derive(Clone, Debug)]
pub struct CorruptOptions {
    pub method: Method,
    /// Bytes at the start of the file that are never touched.
    pub header_len: usize,
    /// Bytes at the end of the file that are never touched.
    pub tail_len: usize,
    pub iterations: usize,
    /// Length of each corrupted run, in bytes.
    pub amount: usize,
    pub offset: u8,
}

impl Default for CorruptOptions {
    fn default() -> Self {
        Self { method: Method::Offset, header_len: 128, tail_len: 128, iterations: 1, amount: 50, offset: 10 }
    }
}

/// Corrupt `data` in place; returns the runs that were changed.
pub fn corrupt_bytes<R: Rng + ?Sized>(
    data: &mut [u8],
    opts: &CorruptOptions,
    rng: &mut R,
) -> Result<Vec<Range<usize>>, Error> {
    let body_end = data.len().saturating_sub(opts.tail_len);
    if body_end < opts.header_len || body_end - opts.header_len < opts.amount {
        return Err(Error::Image(format!(
            "{} bytes leave no room for a {}-byte run between a {}-byte header and {}-byte tail",
            data.len(),
            opts.amount,
            opts.header_len,
            opts.tail_len
        )));
    }

    let mut runs = Vec::with_capacity(opts.iterations);
    for _ in 0..opts.iterations {
        let start = rng.random_range(opts.header_len..=body_end - opts.amount);
        let run = start..start + opts.amount;
        for b in &mut data[run.clone()] {
            *b = match opts.method {
                Method::Random => rng.random(),
                Method::Offset => ((*b as u16 + opts.offset as u16) % 0xFF) as u8,
            };
        }
        runs.push(run);
    }
    Ok(runs)
}

pub fn encode_bmp(img: &DynamicImage) -> Result<Vec<u8>, Error> {
    let mut buf = Vec::new();
    DynamicImage::ImageRgb8(img.to_rgb8()).write_to(&mut Cursor::new(&mut buf), ImageFormat::Bmp)?;
    Ok(buf)
}

/// Load `input`, corrupt its BMP bytes and save the decoded result to `output`.
pub fn corrupt_image<R: Rng + ?Sized>(
    input: &Path,
    output: &Path,
    opts: &CorruptOptions,
    rng: &mut R,
) -> Result<(), Error> {
    log::info!("converting {} to bmp", input.display());
    let img = image::open(input).map_err(|e| Error::Image(format!("{}: {e}", input.display())))?;
    let mut bmp = encode_bmp(&img)?;

    let runs = corrupt_bytes(&mut bmp, opts, rng)?;
    log::info!("corrupted {} run(s) of {} bytes ({:?})", runs.len(), opts.amount, opts.method);
    log::debug!("runs: {runs:?}");

    let glitched = image::load_from_memory_with_format(&bmp, ImageFormat::Bmp)?;
    glitched
        .save(output)
        .map_err(|e| Error::Image(format!("{}: {e}", output.display())))?;
    log::info!("saved {}", output.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::RgbImage;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn header_and_tail_survive() {
        let original: Vec<u8> = (0..1000u32).map(|i| (i % 251) as u8).collect();
        let mut rng = StdRng::seed_from_u64(3);
        for method in [Method::Random, Method::Offset] {
            let mut data = original.clone();
            let opts = CorruptOptions { method, iterations: 5, ..CorruptOptions::default() };
            let runs = corrupt_bytes(&mut data, &opts, &mut rng).unwrap();
            assert_eq!(runs.len(), 5);
            assert_eq!(&data[..128], &original[..128]);
            assert_eq!(&data[872..], &original[872..]);
            assert!(runs.iter().all(|r| r.start >= 128 && r.end <= 872));
        }
    }

    #[test]
    fn offset_method_adds_modulo_0xff() {
        let mut data = vec![250u8; 300];
        let opts = CorruptOptions { header_len: 0, tail_len: 0, amount: 300, offset: 10, ..CorruptOptions::default() };
        corrupt_bytes(&mut data, &opts, &mut StdRng::seed_from_u64(0)).unwrap();
        assert!(data.iter().all(|&b| b == 5)); // (250 + 10) % 255
    }

    #[test]
    fn too_small_input_is_rejected() {
        let mut data = vec![0u8; 200];
        let err = corrupt_bytes(&mut data, &CorruptOptions::default(), &mut StdRng::seed_from_u64(0)).unwrap_err();
        assert!(matches!(err, Error::Image(_)));
    }

    #[test]
    fn corrupted_image_still_decodes_at_the_same_size() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("in.png");
        let output = dir.path().join("out.bmp");
        RgbImage::from_fn(64, 48, |x, y| image::Rgb([x as u8 * 4, y as u8 * 5, 128])).save(&input).unwrap();

        let opts = CorruptOptions { iterations: 3, amount: 400, ..CorruptOptions::default() };
        corrupt_image(&input, &output, &opts, &mut StdRng::seed_from_u64(8)).unwrap();

        let back = image::open(&output).unwrap();
        assert_eq!((back.width(), back.height()), (64, 48));
        let before = image::open(&input).unwrap().to_rgb8();
        assert_ne!(back.to_rgb8(), before);
    }
}
