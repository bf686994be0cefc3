use std::path::{Path, PathBuf};

use anyhow::Context as _;
use clap::{Parser, Subcommand};
use timegrid::{
    BatchThreading, EngineConfig, KeyframeAligner, PipelineOptions, PlatformType,
    PrecisionCompensator, Strictness, TimebaseStandard, TimebaseUnifier, Timeline, VideoInfo,
};

#[derive(Parser, Debug)]
#[command(name = "timegrid", version)]
struct Cli {
    /// Engine configuration JSON (defaults apply to missing fields).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log engine decisions at debug level on stderr.
    #[arg(long, short, global = true, default_value_t = false)]
    verbose: bool,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Repair structural defects and print the repair log.
    Repair(RepairArgs),
    /// Move a timeline onto another timebase and platform clock.
    Unify(UnifyArgs),
    /// Run the full pipeline over a timeline or a JSON array of timelines.
    Process(ProcessArgs),
    /// Print precision, alignment and consistency diagnostics.
    Analyze(AnalyzeArgs),
    /// Re-express a timecode in another timebase.
    Timecode(TimecodeArgs),
}

#[derive(Parser, Debug)]
struct RepairArgs {
    /// Input timeline JSON.
    #[arg(long = "in")]
    in_path: PathBuf,

    /// Output timeline JSON (stdout when omitted).
    #[arg(long)]
    out: Option<PathBuf>,
}

#[derive(Parser, Debug)]
struct UnifyArgs {
    /// Input timeline JSON.
    #[arg(long = "in")]
    in_path: PathBuf,

    /// Target timebase (movie, pal, ntsc, ntsc_drop, film, digital, web, custom).
    #[arg(long)]
    timebase: TimebaseStandard,

    /// Target platform (windows, macos, linux, ios, android, web).
    #[arg(long)]
    platform: Option<PlatformType>,

    /// Frame rate for the custom timebase.
    #[arg(long)]
    custom_fps: Option<f64>,

    /// Output timeline JSON (stdout when omitted).
    #[arg(long)]
    out: Option<PathBuf>,
}

#[derive(Parser, Debug)]
struct ProcessArgs {
    /// Input timeline JSON, or an array of timelines.
    #[arg(long = "in")]
    in_path: PathBuf,

    /// Target timebase; defaults to the platform's.
    #[arg(long)]
    timebase: Option<TimebaseStandard>,

    /// Target platform; defaults to the configured one.
    #[arg(long)]
    platform: Option<PlatformType>,

    /// Frame rate for the custom timebase.
    #[arg(long)]
    custom_fps: Option<f64>,

    /// Enable keyframe optimization at this strictness (low, medium, high).
    #[arg(long)]
    strictness: Option<Strictness>,

    /// Video info JSON (duration, decoder keyframes) for keyframe optimization.
    #[arg(long)]
    video: Option<PathBuf>,

    /// Process array input on a rayon pool.
    #[arg(long, default_value_t = false)]
    parallel: bool,

    /// Override rayon worker threads (parallel mode only).
    #[arg(long)]
    threads: Option<usize>,

    /// Output JSON (stdout when omitted).
    #[arg(long)]
    out: Option<PathBuf>,
}

#[derive(Parser, Debug)]
struct AnalyzeArgs {
    /// Input timeline JSON.
    #[arg(long = "in")]
    in_path: PathBuf,

    /// JSON array of reference keyframe timestamps in seconds.
    #[arg(long)]
    keyframes: Option<PathBuf>,
}

#[derive(Parser, Debug)]
struct TimecodeArgs {
    /// Timecode text, `HH:MM:SS:FF` or `HH:MM:SS.mmm`.
    #[arg(long)]
    text: String,

    /// Source timebase.
    #[arg(long)]
    from: TimebaseStandard,

    /// Destination timebase.
    #[arg(long)]
    to: TimebaseStandard,

    /// Source rate when `--from custom`.
    #[arg(long)]
    from_fps: Option<f64>,

    /// Destination rate when `--to custom`.
    #[arg(long)]
    to_fps: Option<f64>,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let level = if cli.verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::WARN
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .init();

    let config = match &cli.config {
        Some(path) => EngineConfig::load(path)?,
        None => EngineConfig::default(),
    };
    match cli.cmd {
        Command::Repair(args) => cmd_repair(args, config),
        Command::Unify(args) => cmd_unify(args, config),
        Command::Process(args) => cmd_process(args, &config),
        Command::Analyze(args) => cmd_analyze(args, config),
        Command::Timecode(args) => cmd_timecode(args),
    }
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> anyhow::Result<T> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("read '{}'", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("parse '{}'", path.display()))
}

fn write_json<T: serde::Serialize>(value: &T, out: Option<&Path>) -> anyhow::Result<()> {
    let text = serde_json::to_string_pretty(value).context("serialize output")?;
    match out {
        Some(path) => {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("create output dir '{}'", parent.display()))?;
            }
            std::fs::write(path, text + "\n")
                .with_context(|| format!("write '{}'", path.display()))?;
            eprintln!("wrote {}", path.display());
        }
        None => println!("{text}"),
    }
    Ok(())
}

fn cmd_repair(args: RepairArgs, config: EngineConfig) -> anyhow::Result<()> {
    let timeline: Timeline = read_json(&args.in_path)?;
    let (fixed, log) = TimebaseUnifier::new(config).detect_and_fix_timebase_issues(&timeline);
    for line in &log {
        eprintln!("repair: {line}");
    }
    if log.is_empty() {
        eprintln!("no structural issues found");
    }
    write_json(&fixed, args.out.as_deref())
}

fn cmd_unify(args: UnifyArgs, config: EngineConfig) -> anyhow::Result<()> {
    let timeline: Timeline = read_json(&args.in_path)?;
    let unified = TimebaseUnifier::new(config).unify_timeline_timebase(
        &timeline,
        args.timebase,
        args.platform,
        args.custom_fps,
    )?;
    write_json(&unified, args.out.as_deref())
}

fn cmd_process(args: ProcessArgs, config: &EngineConfig) -> anyhow::Result<()> {
    let video: Option<VideoInfo> = args.video.as_deref().map(read_json).transpose()?;
    let options = PipelineOptions {
        target_timebase: args.timebase,
        target_platform: args.platform,
        custom_fps: args.custom_fps,
        strictness: args.strictness,
        video,
    };

    let input: serde_json::Value = read_json(&args.in_path)?;
    if input.is_array() {
        let timelines: Vec<Timeline> =
            serde_json::from_value(input).context("parse timeline array")?;
        let threading = BatchThreading {
            parallel: args.parallel,
            threads: args.threads,
        };
        let results = timegrid::process_batch(&timelines, &options, config, &threading)?;
        let mut processed = Vec::with_capacity(results.len());
        for (i, r) in results.into_iter().enumerate() {
            processed.push(r.with_context(|| format!("timeline {i}"))?);
        }
        write_json(&processed, args.out.as_deref())
    } else {
        let timeline: Timeline = serde_json::from_value(input).context("parse timeline")?;
        let processed = timegrid::process_timeline(&timeline, &options, config)?;
        write_json(&processed, args.out.as_deref())
    }
}

#[derive(serde::Serialize)]
struct Analysis {
    precision_issues: Vec<timegrid::PrecisionIssue>,
    alignment: timegrid::AlignmentReport,
    clip_gaps: Vec<timegrid::Gap>,
    clip_overlaps: Vec<timegrid::Overlap>,
    track_gaps: Vec<Vec<timegrid::Gap>>,
    track_overlaps: Vec<Vec<timegrid::Overlap>>,
    rate_mismatches: Vec<timegrid::RateMismatch>,
}

fn cmd_analyze(args: AnalyzeArgs, config: EngineConfig) -> anyhow::Result<()> {
    let timeline: Timeline = read_json(&args.in_path)?;
    let keyframes: Option<Vec<f64>> = args.keyframes.as_deref().map(read_json).transpose()?;
    let fps = timeline.checked_fps()?;
    let min_gap = config.boundary_tolerance_frames;

    let analysis = Analysis {
        precision_issues: PrecisionCompensator::from_config(&config)
            .analyze_precision_issues(&timeline, fps)?,
        alignment: KeyframeAligner::new(config)
            .analyze_keyframe_alignment(&timeline, keyframes.as_deref())?,
        clip_gaps: timegrid::detect_gaps(timeline.clips.iter().map(|c| &c.span), min_gap),
        clip_overlaps: timegrid::detect_overlaps(timeline.clips.iter().map(|c| &c.span)),
        track_gaps: timeline
            .tracks
            .iter()
            .map(|t| timegrid::detect_gaps(t.items.iter().map(|i| &i.span), min_gap))
            .collect(),
        track_overlaps: timeline
            .tracks
            .iter()
            .map(|t| timegrid::detect_overlaps(t.items.iter().map(|i| &i.span)))
            .collect(),
        rate_mismatches: timegrid::check_frame_rate_compatibility(&timeline)?,
    };
    write_json(&analysis, None)
}

fn cmd_timecode(args: TimecodeArgs) -> anyhow::Result<()> {
    let normalized =
        timegrid::normalize_timecode(&args.text, args.from, args.to, args.from_fps, args.to_fps)
            .with_context(|| format!("normalize timecode '{}'", args.text))?;
    println!("{normalized}");
    Ok(())
}
