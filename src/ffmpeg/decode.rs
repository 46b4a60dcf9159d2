use std::io::Read;
use std::path::Path;

use tracing::warn;

use super::{ChildGuard, FfmpegError, FfmpegTool, FilterChain, drain_stderr, piped, stderr_tail};

/// Parameters for decoding a file to raw f32le PCM on stdout.
pub struct DecodeRequest<'a> {
    pub(crate) input: &'a Path,
    pub(crate) sample_rate: u32,
    pub(crate) channels: u8,
    pub(crate) filter: Option<FilterChain>,
    /// Seek into the input before decoding (seconds).
    pub(crate) start: Option<f64>,
    /// Stop after this many seconds of input.
    pub(crate) limit: Option<f64>,
}

impl<'a> DecodeRequest<'a> {
    /// Mono decode at the analysis sample rate conventions.
    pub fn mono(input: &'a Path, sample_rate: u32) -> Self {
        Self {
            input,
            sample_rate,
            channels: 1,
            filter: None,
            start: None,
            limit: None,
        }
    }

    /// Interleaved stereo decode at the render sample rate conventions.
    pub fn stereo(input: &'a Path, sample_rate: u32) -> Self {
        Self {
            channels: 2,
            ..Self::mono(input, sample_rate)
        }
    }

    pub(crate) fn with_filter(mut self, filter: FilterChain) -> Self {
        if !filter.is_empty() {
            self.filter = Some(filter);
        }
        self
    }

    pub(crate) fn with_window(mut self, start: f64, limit: f64) -> Self {
        self.start = Some(start);
        self.limit = Some(limit);
        self
    }
}

impl FfmpegTool {
    /// Decode to f32 PCM via a stdout pipe.
    ///
    /// A non-zero exit that still produced samples is logged and tolerated
    /// (truncated inputs decode that way); zero output bytes is an error.
    pub fn decode_to_pcm(&self, request: &DecodeRequest<'_>) -> Result<Vec<f32>, FfmpegError> {
        let mut command = self.command();
        if let Some(start) = request.start {
            command.arg("-ss").arg(format!("{start:.2}"));
        }
        if let Some(limit) = request.limit {
            command.arg("-t").arg(format!("{limit:.2}"));
        }
        command.arg("-i").arg(request.input);
        if let Some(filter) = &request.filter {
            command.arg("-af").arg(filter.render());
        }
        command
            .arg("-f")
            .arg("f32le")
            .arg("-acodec")
            .arg("pcm_f32le")
            .arg("-ac")
            .arg(request.channels.to_string())
            .arg("-ar")
            .arg(request.sample_rate.to_string())
            .arg("-");

        let mut guard = ChildGuard::spawn(self, piped(command))?;
        let stderr_handle = drain_stderr(guard.child_mut().stderr.take());

        let mut raw = Vec::new();
        if let Some(mut stdout) = guard.child_mut().stdout.take() {
            stdout
                .read_to_end(&mut raw)
                .map_err(|source| FfmpegError::Io {
                    context: format!("Reading decoded PCM for {}", request.input.display()),
                    source,
                })?;
        }

        let status = guard.wait()?;
        let stderr = stderr_handle.join().unwrap_or_default();
        if !status.success() {
            warn!(
                "Codec tool exited with {status} decoding {}: {}",
                request.input.display(),
                stderr_tail(&stderr)
            );
        }
        if raw.len() < 4 {
            return Err(FfmpegError::EmptyOutput {
                path: request.input.to_path_buf(),
                stderr_tail: stderr_tail(&stderr),
            });
        }

        Ok(bytes_to_f32(&raw))
    }
}

fn bytes_to_f32(raw: &[u8]) -> Vec<f32> {
    raw.chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect()
}
