pub mod binaries;
pub mod encoder;

pub use binaries::Binaries;
pub use encoder::{EncoderProcess, EncoderStream, FrameSource};
