//! PCM canvas renderer: normalizes sources, decodes filter-shaped chunks,
//! overlays them at sample-accurate offsets, and encodes the final mix.

mod canvas;
mod normalize;
pub mod preview;
mod sidecar;

use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{info, warn};

use crate::ffmpeg::{DecodeRequest, EncodeRequest, FfmpegError, FfmpegTool, FilterChain};
use crate::plan::{TransitionSpec, TransitionType};
use crate::timeline::{self, FadePlan, TrackEntry, XfadeBudget};

use canvas::Canvas;
use sidecar::TimelineEntry;

/// Interleaved stereo sample rate of the rendered mix.
pub const RENDER_SAMPLE_RATE: u32 = 44_100;

/// Loudness target the per-chunk gain compensates toward.
const TARGET_LUFS: f64 = -14.0;
/// Per-chunk gain is bounded to avoid amplifying noise floors.
const GAIN_LIMIT_DB: f64 = 10.0;
/// Linear fade applied over the very end of the mix.
const END_FADE_SECONDS: usize = 3;
/// Final limiter settings.
const LIMITER_CEILING: f64 = 0.89;
const LIMITER_ATTACK_MS: u32 = 5;
const LIMITER_RELEASE_MS: u32 = 50;
/// High-pass corner for bass-swap and mashup shaping.
const BASS_CUT_HZ: u32 = 300;
/// Low-pass corner for filter fades.
const FILTER_FADE_HZ: u32 = 400;
/// Hard fade used to de-click a cut exit.
const CUT_FADE_SECONDS: f64 = 0.01;

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("Rendering needs at least 2 usable tracks, got {0}")]
    InsufficientTracks(usize),
    #[error("Chunk decode failed: {0}")]
    Decode(FfmpegError),
    #[error("Final encode failed: {0}")]
    Encode(FfmpegError),
    #[error("{context}: {source}")]
    Io {
        context: String,
        source: std::io::Error,
    },
    #[error("Play bounds violated an invariant on {filename}: start {start:.2} end {end:.2}")]
    InvariantViolation {
        filename: String,
        start: f64,
        end: f64,
    },
}

#[derive(Debug, Clone)]
pub struct RenderOptions {
    pub bitrate_kbps: u32,
    /// Trailing audio below this RMS level (dBFS, over 100 ms blocks) is
    /// trimmed before the timeline is laid out.
    pub silence_floor_db: f64,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            bitrate_kbps: 320,
            silence_floor_db: -40.0,
        }
    }
}

#[derive(Debug)]
pub struct RenderedMix {
    pub mix_path: PathBuf,
    pub lrc_path: PathBuf,
    /// Filenames of tracks dropped by per-track failures.
    pub skipped: Vec<String>,
}

/// Render the full mix.
///
/// One sequential forward pass: each chunk's crossfade is re-clamped against
/// the measured length of the previous chunk, so stated timeline offsets are
/// exact canvas positions rather than planned ones.
pub fn render_mix(
    tool: &FfmpegTool,
    mut playlist: Vec<TrackEntry>,
    transitions: &[TransitionSpec],
    output_path: &Path,
    work_dir: &Path,
    options: &RenderOptions,
) -> Result<RenderedMix, RenderError> {
    if playlist.len() < 2 {
        return Err(RenderError::InsufficientTracks(playlist.len()));
    }
    info!(
        "Rendering {} tracks with {} transitions",
        playlist.len(),
        transitions.len()
    );

    let normalized =
        normalize::normalize_tracks(tool, &mut playlist, work_dir, options.silence_floor_db);
    let fades = timeline::plan_fades(&playlist, transitions);

    let mut canvas = Canvas::new();
    let mut timeline_entries: Vec<TimelineEntry> = Vec::new();
    let mut skipped: Vec<String> = Vec::new();
    let mut current_offset_ms = 0_i64;
    let mut prev_actual_chunk_ms = 0_i64;

    for (i, entry) in playlist.iter().enumerate() {
        let Some(source) = &normalized[i] else {
            skipped.push(entry.filename.clone());
            continue;
        };

        let (start, end) = timeline::clamp_play_bounds(entry.play_start, entry.play_end, entry.duration);
        if start > end {
            return Err(RenderError::InvariantViolation {
                filename: entry.filename.clone(),
                start,
                end,
            });
        }

        if i > 0 {
            let transition = transitions.get(i - 1);
            let budget = XfadeBudget {
                prev_chunk_ms: prev_actual_chunk_ms,
                current_chunk_ms: ((end - start) * 1000.0).round() as i64,
                avg_bpm: (playlist[i - 1].bpm + entry.bpm) / 2.0,
            };
            let target_ms = transition
                .map(|t| (t.duration * 1000.0).round() as i64)
                .unwrap_or(0);
            let xfade_ms = timeline::clamp_crossfade_ms(target_ms, &budget);
            current_offset_ms = (current_offset_ms - xfade_ms).max(0);
        }

        info!(
            "Placing {} at {}ms (window {:.1}s..{:.1}s, prev chunk {}ms)",
            entry.filename, current_offset_ms, start, end, prev_actual_chunk_ms
        );

        let filter = chunk_filter(entry, start, end, &fades[i]);
        let request =
            DecodeRequest::stereo(source.wav.path(), RENDER_SAMPLE_RATE).with_filter(filter);
        let pcm = match tool.decode_to_pcm(&request) {
            Ok(pcm) => pcm,
            Err(err) => {
                warn!("Chunk decode failed for {}: {err}", entry.filename);
                skipped.push(entry.filename.clone());
                continue;
            }
        };

        let chunk_actual_ms =
            pcm.len() as i64 * 1000 / (RENDER_SAMPLE_RATE as i64 * 2);
        timeline_entries.push(TimelineEntry {
            offset_ms: current_offset_ms,
            name: entry.filename.clone(),
        });

        let offset_samples =
            ((current_offset_ms as f64 / 1000.0 * RENDER_SAMPLE_RATE as f64) as usize) * 2;
        canvas.overlay_add(offset_samples, &pcm);

        prev_actual_chunk_ms = chunk_actual_ms;
        current_offset_ms += chunk_actual_ms;
    }

    if timeline_entries.len() < 2 {
        return Err(RenderError::InsufficientTracks(timeline_entries.len()));
    }

    canvas.apply_end_fade(END_FADE_SECONDS * RENDER_SAMPLE_RATE as usize * 2);

    let mix_path = encode_canvas(tool, &canvas, output_path, work_dir, options)?;
    let lrc = sidecar::lrc_path(output_path);
    sidecar::write_lrc(&lrc, &timeline_entries).map_err(|source| RenderError::Io {
        context: format!("Writing timeline sidecar {}", lrc.display()),
        source,
    })?;

    info!(
        "Rendered mix {} ({} tracks placed, {} skipped)",
        mix_path.display(),
        timeline_entries.len(),
        skipped.len()
    );
    Ok(RenderedMix {
        mix_path,
        lrc_path: lrc,
        skipped,
    })
}

/// Per-chunk filter chain: trim to the play window, rebase timestamps,
/// compensate loudness, then shape the seams by transition type.
fn chunk_filter(entry: &TrackEntry, start: f64, end: f64, fades: &FadePlan) -> FilterChain {
    let gain_db = (TARGET_LUFS - entry.loudness_db).clamp(-GAIN_LIMIT_DB, GAIN_LIMIT_DB);
    let mut chain = FilterChain::new()
        .trim(start, end)
        .reset_pts()
        .volume_db(gain_db);

    if fades.entry_fade > 0.0 {
        chain = match fades.entry_kind {
            Some(TransitionType::Mashup) => chain.highpass(BASS_CUT_HZ).volume_db(1.0),
            Some(TransitionType::Cut) => chain,
            _ => chain.fade_in(fades.entry_fade),
        };
    }
    if fades.exit_fade > 0.0 {
        let fade_start = (end - start - fades.exit_fade).max(0.0);
        chain = match fades.exit_kind {
            Some(TransitionType::BassSwap) => chain
                .highpass(BASS_CUT_HZ)
                .fade_out(fade_start, fades.exit_fade),
            Some(TransitionType::FilterFade) => chain
                .lowpass(FILTER_FADE_HZ)
                .fade_out(fade_start, fades.exit_fade),
            Some(TransitionType::Mashup) => chain.volume_db(-1.0),
            Some(TransitionType::Cut) => chain.fade_out(fade_start, CUT_FADE_SECONDS),
            _ => chain.fade_out(fade_start, fades.exit_fade),
        };
    }
    chain
}

fn encode_canvas(
    tool: &FfmpegTool,
    canvas: &Canvas,
    output_path: &Path,
    work_dir: &Path,
    options: &RenderOptions,
) -> Result<PathBuf, RenderError> {
    let blob = tempfile::Builder::new()
        .prefix("final_canvas_")
        .suffix(".pcm")
        .tempfile_in(work_dir)
        .map_err(|source| RenderError::Io {
            context: "Creating canvas blob".to_string(),
            source,
        })?;
    std::fs::write(blob.path(), canvas.to_f32le_bytes()).map_err(|source| RenderError::Io {
        context: "Writing canvas blob".to_string(),
        source,
    })?;

    info!("Encoding final mix from {} canvas samples", canvas.len());
    let request = EncodeRequest::new(blob.path(), output_path, RENDER_SAMPLE_RATE, 2)
        .with_filter(FilterChain::new().limiter(
            LIMITER_CEILING,
            LIMITER_ATTACK_MS,
            LIMITER_RELEASE_MS,
        ))
        .with_bitrate(options.bitrate_kbps);
    tool.encode_pcm_file(&request).map_err(RenderError::Encode)?;
    Ok(output_path.to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(name: &str, duration: f64, loudness: f64) -> TrackEntry {
        TrackEntry {
            filepath: format!("/music/{name}"),
            filename: name.to_string(),
            duration,
            bpm: 120.0,
            loudness_db: loudness,
            play_start: 0.0,
            play_end: duration,
        }
    }

    #[test]
    fn chunk_filter_always_trims_rebases_and_gains() {
        let fades = FadePlan::default();
        let chain = chunk_filter(&entry("a.mp3", 200.0, -16.0), 12.0, 190.0, &fades);
        assert_eq!(
            chain.render(),
            "atrim=start=12.000:end=190.000,asetpts=PTS-STARTPTS,volume=2.00dB"
        );
    }

    #[test]
    fn gain_compensation_is_bounded() {
        let fades = FadePlan::default();
        let quiet = chunk_filter(&entry("q.mp3", 100.0, -60.0), 0.0, 100.0, &fades);
        assert!(quiet.render().contains("volume=10.00dB"));
        let loud = chunk_filter(&entry("l.mp3", 100.0, 6.0), 0.0, 100.0, &fades);
        assert!(loud.render().contains("volume=-10.00dB"));
    }

    #[test]
    fn crossfade_chunks_fade_both_seams() {
        let fades = FadePlan {
            entry_fade: 8.0,
            entry_kind: Some(TransitionType::Crossfade),
            exit_fade: 10.0,
            exit_kind: Some(TransitionType::Crossfade),
        };
        let rendered = chunk_filter(&entry("a.mp3", 200.0, -14.0), 0.0, 200.0, &fades).render();
        assert!(rendered.contains("afade=t=in:d=8.000"));
        assert!(rendered.contains("afade=t=out:st=190.000:d=10.000"));
    }

    #[test]
    fn bass_swap_exit_high_passes_before_fading() {
        let fades = FadePlan {
            entry_fade: 0.0,
            entry_kind: None,
            exit_fade: 8.0,
            exit_kind: Some(TransitionType::BassSwap),
        };
        let rendered = chunk_filter(&entry("a.mp3", 100.0, -14.0), 0.0, 100.0, &fades).render();
        assert!(rendered.contains("highpass=f=300,afade=t=out:st=92.000:d=8.000"));
    }

    #[test]
    fn filter_fade_exit_low_passes() {
        let fades = FadePlan {
            entry_fade: 0.0,
            entry_kind: None,
            exit_fade: 8.0,
            exit_kind: Some(TransitionType::FilterFade),
        };
        let rendered = chunk_filter(&entry("a.mp3", 100.0, -14.0), 0.0, 100.0, &fades).render();
        assert!(rendered.contains("lowpass=f=400,afade=t=out"));
    }

    #[test]
    fn mashup_shapes_with_filters_instead_of_fades() {
        let fades = FadePlan {
            entry_fade: 8.0,
            entry_kind: Some(TransitionType::Mashup),
            exit_fade: 8.0,
            exit_kind: Some(TransitionType::Mashup),
        };
        let rendered = chunk_filter(&entry("a.mp3", 100.0, -14.0), 0.0, 100.0, &fades).render();
        assert!(rendered.contains("highpass=f=300,volume=1.00dB"));
        assert!(rendered.contains("volume=-1.00dB"));
        assert!(!rendered.contains("afade"));
    }

    #[test]
    fn cut_exit_declicks_with_a_hard_fade() {
        let fades = FadePlan {
            entry_fade: 8.0,
            entry_kind: Some(TransitionType::Cut),
            exit_fade: 8.0,
            exit_kind: Some(TransitionType::Cut),
        };
        let rendered = chunk_filter(&entry("a.mp3", 100.0, -14.0), 0.0, 100.0, &fades).render();
        assert!(!rendered.contains("afade=t=in"));
        assert!(rendered.contains("afade=t=out:st=92.000:d=0.010"));
    }

    #[test]
    fn too_few_tracks_is_rejected_before_any_subprocess_work() {
        let tool = FfmpegTool::resolve(Some(PathBuf::from("/nonexistent/ffmpeg")));
        let err = render_mix(
            &tool,
            vec![entry("only.mp3", 100.0, -12.0)],
            &[],
            Path::new("/tmp/out.mp3"),
            Path::new("/tmp"),
            &RenderOptions::default(),
        );
        assert!(matches!(err, Err(RenderError::InsufficientTracks(1))));
    }
}
