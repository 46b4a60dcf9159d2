mod options;

use std::path::PathBuf;

use djmix::analysis::{self, TrackAnalysis};
use djmix::ffmpeg::FfmpegTool;
use djmix::plan::{self, PlanOptions};
use djmix::render::{self, RenderOptions, preview};
use djmix::timeline;
use djmix::weights;
use djmix::{app_dirs, logging};

fn main() {
    let args: Vec<String> = std::env::args().skip(1).collect();
    if let Err(err) = run(args) {
        eprintln!("{err}");
        std::process::exit(1);
    }
}

fn run(args: Vec<String>) -> Result<(), String> {
    let Some(options) = options::parse_args(args)? else {
        return Ok(());
    };

    if let Some(dir) = &options.data_dir {
        app_dirs::set_app_root_override(dir.clone()).map_err(|err| err.to_string())?;
    }
    if let Err(err) = logging::init() {
        eprintln!("Logging unavailable: {err}");
    }

    let tool = FfmpegTool::resolve(options.ffmpeg.clone());
    let cache_dir = app_dirs::cache_dir().map_err(|err| err.to_string())?;
    let weights_path = app_dirs::weights_path().map_err(|err| err.to_string())?;
    let weights = weights::load_weights(&weights_path);

    let analyses = analyze_inputs(&tool, &options.inputs, &cache_dir)?;

    let plan = plan::generate_mix_plan(
        &analyses,
        &weights,
        &PlanOptions {
            scenarios: options.scenarios,
            seed: options.seed,
        },
    )
    .map_err(|err| err.to_string())?;

    if let Some(clip_path) = &options.audition {
        render_audition_clip(&tool, &plan, &cache_dir, clip_path)?;
    }

    let playlist = timeline::compute_play_bounds(&plan.sorted_tracks, &plan.selections);
    let rendered = render::render_mix(
        &tool,
        playlist,
        &plan.selections,
        &options.out,
        &cache_dir,
        &RenderOptions {
            bitrate_kbps: options.bitrate,
            silence_floor_db: options.silence_floor_db,
        },
    )
    .map_err(|err| err.to_string())?;

    for name in &rendered.skipped {
        eprintln!("Skipped: {name}");
    }
    println!("Mix: {}", rendered.mix_path.display());
    println!("Timeline: {}", rendered.lrc_path.display());
    Ok(())
}

fn analyze_inputs(
    tool: &FfmpegTool,
    inputs: &[PathBuf],
    cache_dir: &std::path::Path,
) -> Result<Vec<TrackAnalysis>, String> {
    let mut analyses = Vec::with_capacity(inputs.len());
    let mut failures = Vec::new();
    for result in analysis::analyze_batch(tool, inputs, cache_dir) {
        match result {
            Ok(analysis) => analyses.push(analysis),
            Err(err) => failures.push(err.to_string()),
        }
    }
    for failure in &failures {
        eprintln!("Analysis failed: {failure}");
    }
    if analyses.len() < 2 {
        return Err(format!(
            "Only {} of {} tracks analyzed successfully; need at least 2",
            analyses.len(),
            inputs.len()
        ));
    }
    Ok(analyses)
}

fn render_audition_clip(
    tool: &FfmpegTool,
    plan: &djmix::plan::MixPlan,
    cache_dir: &std::path::Path,
    clip_path: &std::path::Path,
) -> Result<(), String> {
    let Some(spec) = plan.selections.first() else {
        return Err("No transition available for an audition clip".to_string());
    };
    let track_a = PathBuf::from(&plan.sorted_tracks[0].filepath);
    let track_b = PathBuf::from(&plan.sorted_tracks[1].filepath);
    preview::render_audition(tool, &track_a, &track_b, spec, cache_dir, clip_path)
        .map_err(|err| err.to_string())?;
    println!("Audition clip: {}", clip_path.display());
    Ok(())
}
