//! Single audition clip for one planned transition.
//!
//! Composites ten seconds of the outgoing track plus the blend window on a
//! small canvas, using the same chunk-shaping filters as the full render.
//! Unlike the main pass this honors the spec's tempo factors via `atempo`.

use std::path::{Path, PathBuf};

use tracing::info;

use crate::ffmpeg::{DecodeRequest, EncodeRequest, FfmpegTool, FilterChain};
use crate::plan::{TransitionSpec, TransitionType};

use super::canvas::Canvas;
use super::{BASS_CUT_HZ, FILTER_FADE_HZ, RENDER_SAMPLE_RATE, RenderError};

/// Seconds of the outgoing track played before the blend starts.
const PREVIEW_MARGIN_SECONDS: f64 = 10.0;
const PREVIEW_BITRATE_KBPS: u32 = 192;

pub fn render_audition(
    tool: &FfmpegTool,
    track_a: &Path,
    track_b: &Path,
    spec: &TransitionSpec,
    work_dir: &Path,
    output_path: &Path,
) -> Result<PathBuf, RenderError> {
    let margin = PREVIEW_MARGIN_SECONDS;
    let overlap = if spec.duration > 0.0 { spec.duration } else { 10.0 };
    let speed_a = if spec.speed_a > 0.0 { spec.speed_a } else { 1.0 };
    let speed_b = if spec.speed_b > 0.0 { spec.speed_b } else { 1.0 };

    let a_start = (spec.a_out_time - margin).max(0.0);
    let a_window = margin + overlap;
    let b_start = spec.b_in_time;
    let b_window = overlap + margin;

    let (chain_a, chain_b, b_offset_sec) =
        preview_chains(spec.kind, speed_a, speed_b, margin, overlap);

    info!(
        "Rendering audition clip: {} at {:.1}s -> {} ({})",
        track_a.display(),
        spec.a_out_time,
        track_b.display(),
        spec.kind
    );

    let pcm_a = tool
        .decode_to_pcm(
            &DecodeRequest::stereo(track_a, RENDER_SAMPLE_RATE)
                .with_window(a_start, a_window)
                .with_filter(chain_a),
        )
        .map_err(RenderError::Decode)?;
    let pcm_b = tool
        .decode_to_pcm(
            &DecodeRequest::stereo(track_b, RENDER_SAMPLE_RATE)
                .with_window(b_start, b_window)
                .with_filter(chain_b),
        )
        .map_err(RenderError::Decode)?;

    let mut canvas = Canvas::new();
    canvas.overlay_add(0, &pcm_a);
    let offset_samples = ((b_offset_sec * RENDER_SAMPLE_RATE as f64) as usize) * 2;
    canvas.overlay_add(offset_samples, &pcm_b);

    let blob = tempfile::Builder::new()
        .prefix("audition_")
        .suffix(".pcm")
        .tempfile_in(work_dir)
        .map_err(|source| RenderError::Io {
            context: "Creating audition blob".to_string(),
            source,
        })?;
    std::fs::write(blob.path(), canvas.to_f32le_bytes()).map_err(|source| RenderError::Io {
        context: "Writing audition blob".to_string(),
        source,
    })?;

    let request = EncodeRequest::new(blob.path(), output_path, RENDER_SAMPLE_RATE, 2)
        .with_bitrate(PREVIEW_BITRATE_KBPS);
    tool.encode_pcm_file(&request).map_err(RenderError::Encode)?;
    Ok(output_path.to_path_buf())
}

/// Build the A/B shaping chains and where B lands, in post-stretch time.
fn preview_chains(
    kind: TransitionType,
    speed_a: f64,
    speed_b: f64,
    margin: f64,
    overlap: f64,
) -> (FilterChain, FilterChain, f64) {
    let blend_at = margin / speed_a;
    let fade = overlap / speed_a;
    match kind {
        TransitionType::BassSwap => (
            FilterChain::new()
                .atempo(speed_a)
                .highpass(BASS_CUT_HZ)
                .fade_out(blend_at, fade),
            FilterChain::new().atempo(speed_b).fade_in(fade),
            blend_at,
        ),
        TransitionType::Cut => (
            FilterChain::new().atempo(speed_a).trim(0.0, blend_at),
            FilterChain::new().atempo(speed_b),
            blend_at,
        ),
        TransitionType::FilterFade => (
            FilterChain::new()
                .atempo(speed_a)
                .lowpass(FILTER_FADE_HZ)
                .fade_out(blend_at, fade),
            FilterChain::new().atempo(speed_b).fade_in(fade),
            blend_at,
        ),
        TransitionType::Mashup => (
            FilterChain::new().atempo(speed_a).volume_db(-1.0),
            FilterChain::new()
                .atempo(speed_b)
                .highpass(BASS_CUT_HZ)
                .volume_db(1.0),
            blend_at,
        ),
        TransitionType::Crossfade => (
            FilterChain::new().atempo(speed_a).fade_out(blend_at, fade),
            FilterChain::new().atempo(speed_b).fade_in(fade),
            blend_at,
        ),
    }
}
