use std::path::{Path, PathBuf};

use tracing::debug;

use crate::{
    common::errors::{VoiceError, VoiceResult},
    config::BinariesConfig,
};

/// Well-known names for the encoder front-end producing the length-prefixed
/// frame stream.
const ENCODER_CANDIDATES: &[&str] = &["dca", "dca-rs"];

/// Well-known names for the media transcoder the encoder shells out to.
const TRANSCODER_CANDIDATES: &[&str] = &["ffmpeg", "avconv"];

/// Resolved paths of the external audio binaries.
///
/// Detection runs at client construction and fails fast with a distinct
/// [`VoiceError::MissingDependency`] per binary, so a half-configured host is
/// diagnosed before any playback is attempted.
#[derive(Debug, Clone)]
pub struct Binaries {
    pub encoder: PathBuf,
    pub transcoder: PathBuf,
}

impl Binaries {
    pub fn detect(config: &BinariesConfig) -> VoiceResult<Self> {
        let encoder = resolve(config.encoder.as_deref(), ENCODER_CANDIDATES)
            .ok_or(VoiceError::MissingDependency("dca"))?;
        let transcoder = resolve(config.transcoder.as_deref(), TRANSCODER_CANDIDATES)
            .ok_or(VoiceError::MissingDependency("ffmpeg"))?;

        debug!("audio binaries: encoder={:?} transcoder={:?}", encoder, transcoder);
        Ok(Self { encoder, transcoder })
    }
}

/// A configured override wins if it points at an existing file; otherwise the
/// candidates are searched left to right across `PATH`.
fn resolve(configured: Option<&str>, candidates: &[&str]) -> Option<PathBuf> {
    if let Some(path) = configured {
        let path = Path::new(path);
        if path.is_file() {
            return Some(path.to_path_buf());
        }
        return None;
    }

    let path_var = std::env::var_os("PATH")?;
    for candidate in candidates {
        for dir in std::env::split_paths(&path_var) {
            let full = dir.join(candidate);
            if full.is_file() {
                return Some(full);
            }
        }
    }
    None
}
