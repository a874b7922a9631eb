// Tone sequencer: three fixed bytebeat formulas, precomputed into 8-bit
// buffers and played back to back. Finishing a buffer advances the shared
// stage, which is what moves the effect scheduler from one table to the next.

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::audio::AudioSink;
use crate::error::Error;
use crate::scheduler::{Stage, StageCell};

/// The closed set of formulas. `t` is the sample index; products wrap like
/// 32-bit integers and the result is truncated to its low byte.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Waveform {
    /// `(t*(t>>9)*(t>>11)) % 127`
    Crunch,
    /// `((t*(t>>9)*(t>>8)) & (t>>4)) % 127`
    Stutter,
    /// `(t*(t>>5)*(t>>8)) >> 3`
    Sweep,
}

impl Waveform {
    pub const ALL: [Waveform; 3] = [Waveform::Crunch, Waveform::Stutter, Waveform::Sweep];

    #[inline]
    pub fn sample(self, t: i32) -> u8 {
        let v = match self {
            Waveform::Crunch => t.wrapping_mul(t >> 9).wrapping_mul(t >> 11) % 127,
            Waveform::Stutter => (t.wrapping_mul(t >> 9).wrapping_mul(t >> 8) & (t >> 4)) % 127,
            Waveform::Sweep => t.wrapping_mul(t >> 5).wrapping_mul(t >> 8) >> 3,
        };
        v as u8
    }
}

impl FromStr for Waveform {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        // 1-based selector or the waveform's name
        let key = s.trim().to_ascii_lowercase();
        let by_index = key.parse::<usize>().ok().and_then(|n| n.checked_sub(1)).and_then(|i| Self::ALL.get(i));
        by_index
            .or_else(|| Self::ALL.iter().find(|w| w.to_string() == key))
            .copied()
            .ok_or_else(|| Error::UnknownWaveform(s.to_string()))
    }
}

impl fmt::Display for Waveform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Waveform::Crunch => "crunch",
            Waveform::Stutter => "stutter",
            Waveform::Sweep => "sweep",
        };
        f.write_str(name)
    }
}

pub struct ToneBuffer {
    pub waveform: Waveform,
    pub samples: Vec<u8>, // unsigned 8-bit mono PCM
}

pub struct ToneSequencer {
    sample_rate: u32,
    seconds: u32,
    buffers: Vec<ToneBuffer>,
}

impl ToneSequencer {
    pub fn new(sample_rate: u32, seconds: u32) -> Self {
        Self { sample_rate, seconds, buffers: Vec::new() }
    }

    pub fn sample_rate(&self) -> u32 { self.sample_rate }

    pub fn buffers(&self) -> &[ToneBuffer] { &self.buffers }

    /// Precompute `sample_rate * seconds` samples of `waveform` and append them.
    pub fn generate(&mut self, waveform: Waveform) {
        let len = self.sample_rate as usize * self.seconds as usize;
        let samples = (0..len).map(|t| waveform.sample(t as i32)).collect();
        log::debug!("generated {len} samples of {waveform}");
        self.buffers.push(ToneBuffer { waveform, samples });
    }

    /// Play buffer `index` to completion. Out-of-range indices are rejected
    /// before anything reaches the sink.
    pub fn play(&self, index: usize, sink: &mut dyn AudioSink) -> Result<(), Error> {
        let buffer = self.buffers.get(index).ok_or(Error::BufferOutOfRange {
            index,
            len: self.buffers.len(),
        })?;
        log::info!("playing tone {index} ({})", buffer.waveform);
        sink.play_blocking(&buffer.samples, self.sample_rate)
    }

    /// Play every buffer in order, advancing `stage` after each one.
    /// Playback errors are logged and do not hold back the stage.
    pub fn run(&self, sink: &mut dyn AudioSink, stage: &StageCell) {
        for index in 0..self.buffers.len() {
            if let Err(e) = self.play(index, sink) {
                log::error!("{e}");
            }
            let next = stage.advance();
            log::info!("stage -> {next}");
            if next == Stage::Terminal { break; }
        }
    }
}

/// Write one buffer as an 8-bit mono WAV file.
pub fn export_wav(path: &Path, buffer: &ToneBuffer, sample_rate: u32) -> Result<(), Error> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 8,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer = hound::WavWriter::create(path, spec)?;
    for &s in &buffer.samples {
        // hound takes signed 8-bit and stores it as unsigned
        writer.write_sample((s as i16 - 128) as i8)?;
    }
    writer.finalize()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Recorder {
        played: Vec<usize>,
    }

    impl AudioSink for Recorder {
        fn play_blocking(&mut self, samples: &[u8], _sample_rate: u32) -> Result<(), Error> {
            self.played.push(samples.len());
            Ok(())
        }
    }

    #[test]
    fn formulas_match_known_samples() {
        assert_eq!(Waveform::Crunch.sample(0), 0);
        // t = 4096: (4096 * 8 * 2) % 127 = 65536 % 127 = 4
        assert_eq!(Waveform::Crunch.sample(4096), 4);
        // t = 4096: (4096*8*16) & 256 = 0
        assert_eq!(Waveform::Stutter.sample(4096), 0);
        // t = 4096: (4096*128*16) >> 3 = 1048576, low byte 0
        assert_eq!(Waveform::Sweep.sample(4096), 0);
        // t = 1000: (1000*31*3) >> 3 = 11625, low byte 0x69
        assert_eq!(Waveform::Sweep.sample(1000), 0x69);
    }

    #[test]
    fn large_indices_wrap_instead_of_overflowing() {
        let t = 8000 * 60;
        let _ = Waveform::Crunch.sample(t);
        let _ = Waveform::Stutter.sample(t);
        let _ = Waveform::Sweep.sample(t);
    }

    #[test]
    fn selectors_parse_and_unknown_is_fatal() {
        assert_eq!("1".parse::<Waveform>().unwrap(), Waveform::Crunch);
        assert_eq!("Stutter".parse::<Waveform>().unwrap(), Waveform::Stutter);
        assert_eq!(" 3 ".parse::<Waveform>().unwrap(), Waveform::Sweep);
        assert!(matches!("4".parse::<Waveform>(), Err(Error::UnknownWaveform(_))));
    }

    #[test]
    fn out_of_range_play_reports_without_audio() {
        let mut seq = ToneSequencer::new(100, 1);
        seq.generate(Waveform::Crunch);
        let mut sink = Recorder::default();
        let err = seq.play(1, &mut sink).unwrap_err();
        assert!(matches!(err, Error::BufferOutOfRange { index: 1, len: 1 }));
        assert!(sink.played.is_empty());
        seq.play(0, &mut sink).unwrap();
        assert_eq!(sink.played, vec![100]);
    }

    #[test]
    fn run_advances_stage_after_each_buffer() {
        let mut seq = ToneSequencer::new(50, 2);
        for w in Waveform::ALL { seq.generate(w); }
        let stage = StageCell::new(Stage::First);
        let mut sink = Recorder::default();
        seq.run(&mut sink, &stage);
        assert_eq!(sink.played, vec![100, 100, 100]);
        assert_eq!(stage.get(), Stage::Terminal);
    }

    #[test]
    fn wav_export_round_trips_through_hound() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tone.wav");
        let mut seq = ToneSequencer::new(8000, 1);
        seq.generate(Waveform::Sweep);
        export_wav(&path, &seq.buffers()[0], seq.sample_rate()).unwrap();

        let mut reader = hound::WavReader::open(&path).unwrap();
        assert_eq!(reader.spec().bits_per_sample, 8);
        assert_eq!(reader.spec().sample_rate, 8000);
        let back: Vec<u8> = reader.samples::<i8>().map(|s| (s.unwrap() as i16 + 128) as u8).collect();
        assert_eq!(back, seq.buffers()[0].samples);
    }
}
