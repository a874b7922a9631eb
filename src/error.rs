// One error type for the whole binary.
// Graphics failures never show up here: payloads treat them as "skip this tick".
// Every variant states *where* things went wrong.
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Window init error: {0}")]
    WindowInit(String), // Creating the window failed
    #[error("Window update error: {0}")]
    WindowUpdate(String), // Pushing the framebuffer failed
    #[error("Camera init error: {0}")]
    CameraInit(String), // Opening/starting the camera failed
    #[error("Camera frame error: {0}")]
    CameraFrame(String), // Grabbing/decoding a frame failed
    #[error("Image error: {0}")]
    Image(String),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Config error: {0}")]
    Config(String),
    #[error("unknown waveform selector {0:?} (expected 1, 2, 3 or a waveform name)")]
    UnknownWaveform(String),
    #[error("tone buffer index {index} out of range (have {len})")]
    BufferOutOfRange { index: usize, len: usize },
    #[error("Audio device error: {0}")]
    AudioDevice(String),
    #[error("WAV error: {0}")]
    Wav(#[from] hound::Error),
}

impl From<image::ImageError> for Error {
    fn from(e: image::ImageError) -> Self {
        Error::Image(e.to_string())
    }
}
