use std::path::Path;

use super::{ChildGuard, FfmpegError, FfmpegTool, FilterChain, drain_stderr, piped, stderr_tail};

/// Parameters for encoding a raw f32le PCM blob into the output format.
pub struct EncodeRequest<'a> {
    pub(crate) pcm_path: &'a Path,
    pub(crate) sample_rate: u32,
    pub(crate) channels: u8,
    pub(crate) filter: Option<FilterChain>,
    pub(crate) bitrate_kbps: u32,
    pub(crate) output: &'a Path,
}

impl<'a> EncodeRequest<'a> {
    pub fn new(pcm_path: &'a Path, output: &'a Path, sample_rate: u32, channels: u8) -> Self {
        Self {
            pcm_path,
            sample_rate,
            channels,
            filter: None,
            bitrate_kbps: 320,
            output,
        }
    }

    pub(crate) fn with_filter(mut self, filter: FilterChain) -> Self {
        if !filter.is_empty() {
            self.filter = Some(filter);
        }
        self
    }

    pub fn with_bitrate(mut self, kbps: u32) -> Self {
        self.bitrate_kbps = kbps;
        self
    }
}

impl FfmpegTool {
    /// Encode a raw PCM blob. Unlike decoding, a non-zero exit here is fatal:
    /// the output file cannot be trusted.
    pub fn encode_pcm_file(&self, request: &EncodeRequest<'_>) -> Result<(), FfmpegError> {
        let mut command = self.command();
        command
            .arg("-y")
            .arg("-f")
            .arg("f32le")
            .arg("-ar")
            .arg(request.sample_rate.to_string())
            .arg("-ac")
            .arg(request.channels.to_string())
            .arg("-i")
            .arg(request.pcm_path);
        if let Some(filter) = &request.filter {
            command.arg("-af").arg(filter.render());
        }
        command
            .arg("-b:a")
            .arg(format!("{}k", request.bitrate_kbps))
            .arg("-q:a")
            .arg("0")
            .arg(request.output);

        let mut guard = ChildGuard::spawn(self, piped(command))?;
        let stderr_handle = drain_stderr(guard.child_mut().stderr.take());
        let status = guard.wait()?;
        let stderr = stderr_handle.join().unwrap_or_default();

        if !status.success() {
            return Err(FfmpegError::NonZeroExit {
                status: status.to_string(),
                stderr_tail: stderr_tail(&stderr),
            });
        }
        Ok(())
    }
}
