//! HTTP clients for the external speech and generation providers.

pub mod image;
pub mod speech;
pub mod text;

pub use image::{ImageClient, ImageOutput, ImageRequest};
pub use speech::{SpeechClient, TranscriptOutput};
pub use text::{TextClient, TextOutput};
