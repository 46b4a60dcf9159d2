use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::Path;

use tempfile::NamedTempFile;
use tracing::{debug, warn};

use crate::analysis::batch;
use crate::ffmpeg::{DecodeRequest, FfmpegTool, FilterChain};
use crate::timeline::TrackEntry;

use super::RENDER_SAMPLE_RATE;

/// EBU R128 targets for the per-track levelling pass.
const LOUDNORM_INTEGRATED: f64 = -14.0;
const LOUDNORM_TRUE_PEAK: f64 = -1.5;
const LOUDNORM_RANGE: f64 = 11.0;

/// Canonical PCM WAV header size; the normalized files are written locally
/// so the layout is under our control.
const WAV_HEADER_BYTES: u64 = 44;
/// Samples per 100 ms scan block, both channels interleaved.
const SCAN_BLOCK_SAMPLES: i64 = 4410 * 2;

/// A track normalized to stereo s16 WAV, with its usable end after trailing
/// silence. The temp file is deleted when this drops.
pub(crate) struct NormalizedTrack {
    pub(crate) wav: NamedTempFile,
    pub(crate) play_end: f64,
}

/// Normalize every playlist entry in parallel (cap 4) and trim trailing
/// silence. Per-track failures yield `None` and are skipped by the caller;
/// successful entries get their `play_end` pulled in when the trim found a
/// shorter usable tail.
pub(crate) fn normalize_tracks(
    tool: &FfmpegTool,
    playlist: &mut [TrackEntry],
    work_dir: &Path,
    silence_floor_db: f64,
) -> Vec<Option<NormalizedTrack>> {
    let results = {
        let shared: &[TrackEntry] = playlist;
        batch::run_indexed(shared.len(), batch::MAX_PARALLEL_JOBS, |idx| {
            normalize_one(tool, &shared[idx], work_dir, silence_floor_db)
        })
    };

    for (entry, result) in playlist.iter_mut().zip(&results) {
        if let Some(normalized) = result {
            if entry.play_end <= 0.0 || entry.play_end > normalized.play_end {
                entry.play_end = normalized.play_end;
            }
        }
    }
    results
}

fn normalize_one(
    tool: &FfmpegTool,
    entry: &TrackEntry,
    work_dir: &Path,
    silence_floor_db: f64,
) -> Option<NormalizedTrack> {
    let wav = match tempfile::Builder::new()
        .prefix("norm_")
        .suffix(".wav")
        .tempfile_in(work_dir)
    {
        Ok(file) => file,
        Err(err) => {
            warn!("Temp WAV for {} failed: {err}", entry.filename);
            return None;
        }
    };

    let request = DecodeRequest::stereo(Path::new(&entry.filepath), RENDER_SAMPLE_RATE)
        .with_filter(FilterChain::new().loudnorm(
            LOUDNORM_INTEGRATED,
            LOUDNORM_TRUE_PEAK,
            LOUDNORM_RANGE,
        ));
    let pcm = match tool.decode_to_pcm(&request) {
        Ok(pcm) => pcm,
        Err(err) => {
            warn!("Normalization failed for {}: {err}", entry.filename);
            return None;
        }
    };

    if let Err(err) = write_s16_wav(wav.path(), &pcm) {
        warn!("Writing normalized WAV for {} failed: {err}", entry.filename);
        return None;
    }

    let play_end = trim_silence_end(wav.path(), silence_floor_db);
    debug!(
        "Normalized {} ({:.1}s usable)",
        entry.filename, play_end
    );
    Some(NormalizedTrack { wav, play_end })
}

fn write_s16_wav(path: &Path, pcm: &[f32]) -> Result<(), String> {
    let spec = hound::WavSpec {
        channels: 2,
        sample_rate: RENDER_SAMPLE_RATE,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer =
        hound::WavWriter::create(path, spec).map_err(|err| format!("create WAV: {err}"))?;
    for &sample in pcm {
        let value = (sample.clamp(-1.0, 1.0) * 32_767.0).round() as i16;
        writer
            .write_sample(value)
            .map_err(|err| format!("write WAV: {err}"))?;
    }
    writer.finalize().map_err(|err| format!("finalize WAV: {err}"))
}

/// Scan backward from the end of a normalized WAV in 100 ms blocks and return
/// the effective duration in seconds, skipping trailing audio below the
/// silence floor. Seek-based reads keep this at ~17 KiB per block no matter
/// how long the file is.
pub(crate) fn trim_silence_end(wav_path: &Path, silence_floor_db: f64) -> f64 {
    let Ok(mut file) = File::open(wav_path) else {
        return 0.0;
    };
    let Ok(meta) = file.metadata() else {
        return 0.0;
    };
    let file_size = meta.len() as i64;
    if file_size <= WAV_HEADER_BYTES as i64 {
        return 0.0;
    }

    let total_samples = (file_size - WAV_HEADER_BYTES as i64) / 2;
    let block_bytes = (SCAN_BLOCK_SAMPLES * 2) as usize;
    let mut buf = vec![0u8; block_bytes];

    let mut effective_samples = total_samples;
    let mut j = total_samples - SCAN_BLOCK_SAMPLES;
    while j >= 0 {
        let offset = WAV_HEADER_BYTES as i64 + j * 2;
        if file.seek(SeekFrom::Start(offset as u64)).is_err() {
            break;
        }
        let read = match file.read(&mut buf) {
            Ok(0) | Err(_) => break,
            Ok(read) => read,
        };
        let count = read / 2;
        let mut sum_sq = 0.0_f64;
        for frame in buf[..count * 2].chunks_exact(2) {
            let value = i16::from_le_bytes([frame[0], frame[1]]) as f64 / 32_768.0;
            sum_sq += value * value;
        }
        let rms = (sum_sq / count as f64).sqrt();
        if 20.0 * (rms + 1e-9).log10() > silence_floor_db {
            effective_samples = j + SCAN_BLOCK_SAMPLES;
            break;
        }
        j -= SCAN_BLOCK_SAMPLES;
    }
    effective_samples as f64 / (RENDER_SAMPLE_RATE as f64 * 2.0)
}
