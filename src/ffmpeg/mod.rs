//! Minimal adapter over the external codec process.
//!
//! Everything that touches compressed audio goes through here: decoding any
//! input to raw f32le PCM and encoding a raw PCM blob to the output format.
//! The tool path is resolved once per process and passed by reference; there
//! is no process-global state.

mod decode;
mod encode;
pub(crate) mod filter;

pub use decode::DecodeRequest;
pub use encode::EncodeRequest;
pub(crate) use filter::FilterChain;

use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};

use thiserror::Error;

/// Environment variable consulted when no explicit path is configured.
const TOOL_ENV_VAR: &str = "FFMPEG_PATH";
/// Name looked up in PATH as the last resort.
const TOOL_DEFAULT: &str = "ffmpeg";

/// Bytes of stderr kept for diagnostics on failure.
const STDERR_TAIL_BYTES: usize = 2048;

#[derive(Debug, Error)]
pub enum FfmpegError {
    #[error("Failed to launch codec tool {tool}: {source}")]
    Spawn {
        tool: PathBuf,
        source: std::io::Error,
    },
    #[error("{context}: {source}")]
    Io {
        context: String,
        source: std::io::Error,
    },
    #[error("Codec tool exited with {status}: {stderr_tail}")]
    NonZeroExit { status: String, stderr_tail: String },
    #[error("No audio data decoded from {path} ({stderr_tail})")]
    EmptyOutput { path: PathBuf, stderr_tail: String },
}

/// Handle to the resolved codec tool.
#[derive(Debug, Clone)]
pub struct FfmpegTool {
    path: PathBuf,
}

impl FfmpegTool {
    /// Resolve the tool path: explicit config, then the `FFMPEG_PATH`
    /// environment override, then the bare name found via PATH.
    pub fn resolve(explicit: Option<PathBuf>) -> Self {
        let path = explicit
            .or_else(|| std::env::var_os(TOOL_ENV_VAR).map(PathBuf::from))
            .unwrap_or_else(|| PathBuf::from(TOOL_DEFAULT));
        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub(crate) fn command(&self) -> Command {
        let mut cmd = Command::new(&self.path);
        cmd.arg("-v").arg("error");
        cmd
    }
}

/// Child process wrapper that guarantees termination when dropped, so an
/// unwinding render job never leaks a codec process.
pub(crate) struct ChildGuard {
    child: Child,
}

impl ChildGuard {
    pub(crate) fn spawn(tool: &FfmpegTool, mut command: Command) -> Result<Self, FfmpegError> {
        let child = command.spawn().map_err(|source| FfmpegError::Spawn {
            tool: tool.path.clone(),
            source,
        })?;
        Ok(Self { child })
    }

    pub(crate) fn child_mut(&mut self) -> &mut Child {
        &mut self.child
    }

    pub(crate) fn wait(mut self) -> Result<std::process::ExitStatus, FfmpegError> {
        self.child.wait().map_err(|source| FfmpegError::Io {
            context: "Waiting for codec tool".to_string(),
            source,
        })
    }
}

impl Drop for ChildGuard {
    fn drop(&mut self) {
        if let Ok(None) = self.child.try_wait() {
            let _ = self.child.kill();
            let _ = self.child.wait();
        }
    }
}

/// Drain a stderr pipe on a helper thread so the child never blocks on a full
/// pipe while the caller is reading stdout.
pub(crate) fn drain_stderr(
    stderr: Option<std::process::ChildStderr>,
) -> std::thread::JoinHandle<Vec<u8>> {
    std::thread::spawn(move || {
        let mut buf = Vec::new();
        if let Some(mut pipe) = stderr {
            let _ = pipe.read_to_end(&mut buf);
        }
        buf
    })
}

pub(crate) fn stderr_tail(buf: &[u8]) -> String {
    let start = buf.len().saturating_sub(STDERR_TAIL_BYTES);
    String::from_utf8_lossy(&buf[start..]).trim().to_string()
}

pub(crate) fn piped(mut command: Command) -> Command {
    command
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());
    command
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_path_wins_over_environment() {
        let tool = FfmpegTool::resolve(Some(PathBuf::from("/opt/codec/ffmpeg")));
        assert_eq!(tool.path(), Path::new("/opt/codec/ffmpeg"));
    }

    #[test]
    fn default_path_is_the_bare_tool_name() {
        // The environment override is deliberately not exercised here; tests
        // must not depend on ambient variables.
        let tool = FfmpegTool { path: PathBuf::from(TOOL_DEFAULT) };
        assert_eq!(tool.path(), Path::new("ffmpeg"));
    }

    #[test]
    fn stderr_tail_keeps_only_the_end() {
        let mut noise = vec![b'x'; STDERR_TAIL_BYTES * 2];
        let marker = b"final diagnostics";
        noise.extend_from_slice(marker);
        let tail = stderr_tail(&noise);
        assert!(tail.ends_with("final diagnostics"));
        assert!(tail.len() <= STDERR_TAIL_BYTES);
    }
}
