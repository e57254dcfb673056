use std::path::Path;
use std::process::Stdio;

use async_trait::async_trait;
use tokio::{
    io::{AsyncRead, AsyncReadExt, BufReader},
    process::{Child, ChildStdout, Command},
};
use tracing::debug;

use crate::{
    audio::binaries::Binaries,
    common::errors::{VoiceError, VoiceResult},
};

/// A length-prefixed frame stream: `u16le length` followed by that many bytes
/// of encoded audio, repeated until the producer closes its end.
///
/// Read failures are reported as `None` rather than errors — the pump treats
/// them as possible end-of-stream and applies its own debounce before giving
/// up, so a transient gap in the producer does not cut the stream short.
#[async_trait]
pub trait FrameSource: Send {
    /// Reads the next 2-byte little-endian frame header.
    async fn next_len(&mut self) -> Option<u16>;

    /// Reads up to `len` payload bytes into `buf`, returning how many were
    /// actually read. `None` means not a single byte was available.
    async fn read_frame(&mut self, len: usize, buf: &mut [u8]) -> Option<usize>;
}

/// [`FrameSource`] over any async byte stream, normally the encoder child's
/// stdout.
pub struct EncoderStream<R> {
    reader: BufReader<R>,
}

impl<R: AsyncRead + Unpin + Send> EncoderStream<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader: BufReader::new(reader),
        }
    }
}

#[async_trait]
impl<R: AsyncRead + Unpin + Send> FrameSource for EncoderStream<R> {
    async fn next_len(&mut self) -> Option<u16> {
        self.reader.read_u16_le().await.ok()
    }

    async fn read_frame(&mut self, len: usize, buf: &mut [u8]) -> Option<usize> {
        let mut filled = 0;
        while filled < len {
            match self.reader.read(&mut buf[filled..len]).await {
                Ok(0) | Err(_) => break,
                Ok(n) => filled += n,
            }
        }
        if filled == 0 { None } else { Some(filled) }
    }
}

/// The external encoder process. Spawned per playback, consumed once.
pub struct EncoderProcess {
    child: Child,
    pub stream: EncoderStream<ChildStdout>,
}

impl EncoderProcess {
    /// Starts the encoder against a local source file. Its stdout carries the
    /// length-prefixed frame stream; stderr is discarded.
    pub fn spawn(binaries: &Binaries, source: &Path, channels: u32) -> VoiceResult<Self> {
        debug!("spawning encoder {:?} for {:?}", binaries.encoder, source);

        let mut child = Command::new(&binaries.encoder)
            .arg("-i")
            .arg(source)
            .arg("-ac")
            .arg(channels.to_string())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| VoiceError::Transport("encoder stdout was not captured".into()))?;

        Ok(Self {
            child,
            stream: EncoderStream::new(stdout),
        })
    }

    /// Waits for the encoder to exit. A nonzero status fails the playback
    /// that spawned it; no further detail is captured.
    pub async fn wait(mut self) -> VoiceResult<()> {
        let status = self.child.wait().await?;
        if status.success() {
            Ok(())
        } else {
            Err(VoiceError::EncoderProcessFailed(status.code().unwrap_or(-1)))
        }
    }

    /// Kills the encoder without waiting for a clean exit (stop path).
    pub fn kill(&mut self) {
        let _ = self.child.start_kill();
    }
}
