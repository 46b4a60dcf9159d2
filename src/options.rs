use std::path::PathBuf;

/// Parsed command line for the `djmix` binary.
#[derive(Debug, Clone)]
pub(crate) struct MixOptions {
    pub(crate) inputs: Vec<PathBuf>,
    pub(crate) out: PathBuf,
    pub(crate) ffmpeg: Option<PathBuf>,
    pub(crate) data_dir: Option<PathBuf>,
    pub(crate) scenarios: usize,
    pub(crate) seed: u64,
    pub(crate) bitrate: u32,
    pub(crate) silence_floor_db: f64,
    pub(crate) audition: Option<PathBuf>,
}

/// Parse arguments; `Ok(None)` means help was printed and the caller should
/// exit cleanly.
pub(crate) fn parse_args(args: Vec<String>) -> Result<Option<MixOptions>, String> {
    let mut options = default_options();
    let mut idx = 0usize;
    while idx < args.len() {
        let flag = args[idx].as_str();
        if flag == "-h" || flag == "--help" {
            println!("{}", help_text());
            return Ok(None);
        }
        if !apply_value(&mut options, &args, &mut idx, flag)? {
            if flag.starts_with('-') {
                return Err(format!("Unknown argument: {flag}\n\n{}", help_text()));
            }
            options.inputs.push(PathBuf::from(flag));
        }
        idx += 1;
    }
    if options.inputs.len() < 2 {
        return Err(format!(
            "Need at least 2 input audio files, got {}\n\n{}",
            options.inputs.len(),
            help_text()
        ));
    }
    Ok(Some(options))
}

fn default_options() -> MixOptions {
    MixOptions {
        inputs: Vec::new(),
        out: PathBuf::from("mix.mp3"),
        ffmpeg: None,
        data_dir: None,
        scenarios: 5,
        seed: 42,
        bitrate: 320,
        silence_floor_db: -40.0,
        audition: None,
    }
}

fn apply_value(
    options: &mut MixOptions,
    args: &[String],
    idx: &mut usize,
    flag: &str,
) -> Result<bool, String> {
    match flag {
        "--out" => options.out = PathBuf::from(value_after(args, idx, "--out")?),
        "--ffmpeg" => options.ffmpeg = Some(PathBuf::from(value_after(args, idx, "--ffmpeg")?)),
        "--data-dir" => {
            options.data_dir = Some(PathBuf::from(value_after(args, idx, "--data-dir")?));
        }
        "--scenarios" => options.scenarios = parse_number(args, idx, "--scenarios")?,
        "--seed" => options.seed = parse_number(args, idx, "--seed")?,
        "--bitrate" => options.bitrate = parse_number(args, idx, "--bitrate")?,
        "--silence-floor-db" => {
            options.silence_floor_db = parse_number(args, idx, "--silence-floor-db")?;
        }
        "--audition" => {
            options.audition = Some(PathBuf::from(value_after(args, idx, "--audition")?));
        }
        _ => return Ok(false),
    }
    Ok(true)
}

fn value_after<'a>(args: &'a [String], idx: &mut usize, flag: &str) -> Result<&'a str, String> {
    *idx += 1;
    args.get(*idx)
        .map(String::as_str)
        .ok_or_else(|| format!("Missing value after {flag}"))
}

fn parse_number<T: std::str::FromStr>(
    args: &[String],
    idx: &mut usize,
    flag: &str,
) -> Result<T, String> {
    let raw = value_after(args, idx, flag)?;
    raw.parse()
        .map_err(|_| format!("Invalid value for {flag}: {raw}"))
}

fn help_text() -> String {
    [
        "djmix - beat-aware automatic DJ mix renderer",
        "",
        "Usage: djmix [options] <audio file> <audio file> [more files...]",
        "",
        "Options:",
        "  --out <path>            Output mix path (default mix.mp3)",
        "  --ffmpeg <path>         Explicit codec tool path",
        "  --data-dir <path>       Override the .djmix app root",
        "  --scenarios <n>         Planner scenario count (default 5)",
        "  --seed <n>              Planner base seed (default 42)",
        "  --bitrate <kbps>        Final encode bitrate (default 320)",
        "  --silence-floor-db <f>  Tail-trim threshold in dBFS (default -40)",
        "  --audition <path>       Also render a clip of the first transition",
        "  -h, --help              Show this help",
    ]
    .join("\n")
}
