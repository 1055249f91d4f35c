//! Audio input: WAV decoding to mono samples.

pub mod wav;

pub use wav::{DecodedAudio, decode_file, decode_wav};
