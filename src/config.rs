// Run settings: built-in defaults, optionally overlaid by a RON file, then by
// CLI flags (see main.rs). Everything is checked once at startup; a bad value
// stops the program before the window opens.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::bytebeat::Waveform;
use crate::error::Error;
use crate::scheduler::{DispatchTable, Stage};

/// What the screen surface shows before the first payload runs.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Backdrop {
    /// Built-in color bars + grid.
    Pattern,
    /// Any image the `image` crate can decode, scaled to the screen size.
    Image(PathBuf),
    /// One frame from a webcam.
    Camera(u32),
}

impl FromStr for Backdrop {
    type Err = Error;

    /// `pattern`, `camera`, `camera:N`, or a path to an image.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pattern" => Ok(Backdrop::Pattern),
            "camera" => Ok(Backdrop::Camera(0)),
            _ => match s.strip_prefix("camera:") {
                Some(idx) => idx
                    .parse()
                    .map(Backdrop::Camera)
                    .map_err(|_| Error::Config(format!("bad camera index {idx:?}"))),
                None => Ok(Backdrop::Image(PathBuf::from(s))),
            },
        }
    }
}

impl fmt::Display for Backdrop {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Backdrop::Pattern => f.write_str("pattern"),
            Backdrop::Image(p) => write!(f, "{}", p.display()),
            Backdrop::Camera(i) => write!(f, "camera:{i}"),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioSettings {
    /// Try to open an output device (needs the `audio` feature).
    pub enabled: bool,
    pub sample_rate: u32,
    /// Length of each tone buffer.
    pub seconds: u32,
    /// Formula selectors, one buffer each: "1"/"2"/"3" or a waveform name.
    pub waveforms: Vec<String>,
}

impl Default for AudioSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            sample_rate: 8000,
            seconds: 20,
            waveforms: vec!["1".into(), "2".into(), "3".into()],
        }
    }
}

impl AudioSettings {
    pub fn parsed_waveforms(&self) -> Result<Vec<Waveform>, Error> {
        self.waveforms.iter().map(|s| s.parse()).collect()
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub width: usize,
    pub height: usize,
    /// Stop when the tick counter reaches this value; `None` leaves the run unbounded.
    pub tick_limit: Option<u64>,
    pub start_stage: Stage,
    /// Fixed RNG seed for reproducible runs.
    pub seed: Option<u64>,
    pub backdrop: Backdrop,
    /// How often the window is refreshed; ticks themselves are uncapped.
    pub present_fps: usize,
    pub hud: bool,
    /// Ask before starting.
    pub prompt: bool,
    pub audio: AudioSettings,
    pub dispatch: DispatchTable,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            width: 1024,
            height: 768,
            tick_limit: None,
            start_stage: Stage::First,
            seed: None,
            backdrop: Backdrop::Pattern,
            present_fps: 60,
            hud: false,
            prompt: true,
            audio: AudioSettings::default(),
            dispatch: DispatchTable::default(),
        }
    }
}

impl Settings {
    /// Defaults, or defaults overlaid with the RON file at `path`.
    pub fn load(path: Option<&Path>) -> Result<Self, Error> {
        let Some(path) = path else { return Ok(Self::default()) };
        let text = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("{}: {e}", path.display())))?;
        let settings: Settings = ron::from_str(&text)
            .map_err(|e| Error::Config(format!("{}: {e}", path.display())))?;
        log::info!("loaded settings from {}", path.display());
        Ok(settings)
    }

    pub fn validate(&self) -> Result<(), Error> {
        if self.width == 0 || self.height == 0 {
            return Err(Error::Config(format!("screen size {}x{} is empty", self.width, self.height)));
        }
        if self.present_fps == 0 {
            return Err(Error::Config("present_fps must be at least 1".into()));
        }
        if self.tick_limit == Some(0) {
            return Err(Error::Config("tick_limit must be at least 1".into()));
        }
        if self.audio.sample_rate == 0 || self.audio.seconds == 0 {
            return Err(Error::Config("audio sample_rate and seconds must be non-zero".into()));
        }
        self.audio.parsed_waveforms()?;
        self.dispatch.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_are_valid() {
        Settings::default().validate().unwrap();
        assert_eq!(Settings::load(None).unwrap(), Settings::default());
    }

    #[test]
    fn partial_ron_file_keeps_other_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"(
                width: 640,
                tick_limit: Some(500),
                start_stage: Second,
                backdrop: Image("desk.png"),
                audio: (waveforms: ["1", "sweep"]),
            )"#
        )
        .unwrap();
        let s = Settings::load(Some(file.path())).unwrap();
        assert_eq!(s.width, 640);
        assert_eq!(s.height, 768);
        assert_eq!(s.tick_limit, Some(500));
        assert_eq!(s.start_stage, Stage::Second);
        assert_eq!(s.backdrop, Backdrop::Image(PathBuf::from("desk.png")));
        assert_eq!(s.audio.sample_rate, 8000);
        assert_eq!(s.audio.parsed_waveforms().unwrap(), vec![Waveform::Crunch, Waveform::Sweep]);
        assert_eq!(s.dispatch, DispatchTable::default());
        s.validate().unwrap();
    }

    #[test]
    fn unknown_waveform_fails_validation() {
        let mut s = Settings::default();
        s.audio.waveforms.push("square".into());
        assert!(matches!(s.validate(), Err(Error::UnknownWaveform(w)) if w == "square"));
    }

    #[test]
    fn malformed_file_is_a_config_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "(width: \"wide\")").unwrap();
        assert!(matches!(Settings::load(Some(file.path())), Err(Error::Config(_))));
    }

    #[test]
    fn backdrop_parses_from_cli_text() {
        assert_eq!("pattern".parse::<Backdrop>().unwrap(), Backdrop::Pattern);
        assert_eq!("camera".parse::<Backdrop>().unwrap(), Backdrop::Camera(0));
        assert_eq!("camera:2".parse::<Backdrop>().unwrap(), Backdrop::Camera(2));
        assert_eq!("a/b.jpg".parse::<Backdrop>().unwrap(), Backdrop::Image("a/b.jpg".into()));
        assert!("camera:x".parse::<Backdrop>().is_err());
    }

    #[test]
    fn zero_sizes_are_rejected() {
        let s = Settings { width: 0, ..Settings::default() };
        assert!(s.validate().is_err());
        let s = Settings { tick_limit: Some(0), ..Settings::default() };
        assert!(s.validate().is_err());
    }
}
