use rayon::prelude::*;

use crate::config::EngineConfig;
use crate::foundation::error::{TimegridError, TimegridResult};
use crate::time::timebase::{PlatformSetting, PlatformType, TimebaseStandard};
use crate::timeline::keyframe::{AlignmentReport, KeyframeAligner, Strictness, VideoInfo};
use crate::timeline::model::Timeline;
use crate::timeline::precision::{PrecisionCompensator, PrecisionIssue};
use crate::timeline::unify::TimebaseUnifier;

/// What [`process_timeline`] should do beyond repair and precision cleanup.
#[derive(Clone, Debug, Default, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct PipelineOptions {
    /// Target timebase; `None` uses the default timebase of the target platform.
    pub target_timebase: Option<TimebaseStandard>,
    /// Target platform; `None` uses the configured platform.
    pub target_platform: Option<PlatformType>,
    /// Rate for [`TimebaseStandard::Custom`].
    pub custom_fps: Option<f64>,
    /// Keyframe optimization strictness; `None` skips keyframe optimization.
    pub strictness: Option<Strictness>,
    /// Source media information for keyframe optimization.
    pub video: Option<VideoInfo>,
}

/// Output of [`process_timeline`].
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ProcessedTimeline {
    /// Unified, corrected timeline.
    pub timeline: Timeline,
    /// Structural repairs applied to the input.
    pub repair_log: Vec<String>,
    /// Precision findings on the repaired input, before correction.
    pub precision_issues: Vec<PrecisionIssue>,
    /// Keyframe alignment after optimization, when it ran.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alignment: Option<AlignmentReport>,
}

/// Run the full engine over one timeline.
///
/// Steps, in order: structural repair, timebase unification, precision
/// correction, keyframe optimization (when `options.strictness` is set) and a
/// final boundary pass. An `Auto` platform in `config` is resolved once here.
#[tracing::instrument(skip_all, fields(clips = timeline.clips.len(), tracks = timeline.tracks.len()))]
pub fn process_timeline(
    timeline: &Timeline,
    options: &PipelineOptions,
    config: &EngineConfig,
) -> TimegridResult<ProcessedTimeline> {
    config.validate()?;
    run(timeline, options, &resolved(config))
}

fn resolved(config: &EngineConfig) -> EngineConfig {
    EngineConfig {
        platform: PlatformSetting::Fixed(config.platform()),
        ..config.clone()
    }
}

fn run(
    timeline: &Timeline,
    options: &PipelineOptions,
    config: &EngineConfig,
) -> TimegridResult<ProcessedTimeline> {
    let unifier = TimebaseUnifier::new(config.clone());
    let compensator = PrecisionCompensator::from_config(config);

    let (repaired, repair_log) = unifier.detect_and_fix_timebase_issues(timeline);
    let precision_issues = compensator.analyze_precision_issues(&repaired, repaired.fps)?;

    let platform = options
        .target_platform
        .unwrap_or_else(|| config.platform());
    let target = options
        .target_timebase
        .unwrap_or_else(|| platform.default_timebase());
    let unified =
        unifier.unify_timeline_timebase(&repaired, target, Some(platform), options.custom_fps)?;
    let mut current = compensator.correct_timeline_precision(&unified, unified.fps)?;

    let mut alignment = None;
    if let Some(strictness) = options.strictness {
        let aligner = KeyframeAligner::new(config.clone());
        current = aligner.optimize_timeline_keyframes(&current, options.video.as_ref(), strictness)?;
        let reference = options
            .video
            .as_ref()
            .map(|v| v.keyframes.as_slice())
            .filter(|k| !k.is_empty());
        alignment = Some(aligner.analyze_keyframe_alignment(&current, reference)?);
    }

    let timeline = unifier.compensate_timeline_boundaries(&current)?;
    tracing::debug!(
        repairs = repair_log.len(),
        issues = precision_issues.len(),
        fps = timeline.fps,
        "processed timeline"
    );
    Ok(ProcessedTimeline {
        timeline,
        repair_log,
        precision_issues,
        alignment,
    })
}

/// Worker settings for [`process_batch`].
#[derive(Clone, Debug, Default)]
pub struct BatchThreading {
    /// Process timelines on a dedicated rayon pool.
    pub parallel: bool,
    /// Pool size; `None` lets rayon decide.
    pub threads: Option<usize>,
}

/// Process independent timelines, one result per input in input order.
///
/// A failure on one timeline does not affect the others; the outer error is
/// reserved for invalid configuration or a pool that cannot be built.
#[tracing::instrument(skip_all, fields(count = timelines.len(), parallel = threading.parallel))]
pub fn process_batch(
    timelines: &[Timeline],
    options: &PipelineOptions,
    config: &EngineConfig,
    threading: &BatchThreading,
) -> TimegridResult<Vec<TimegridResult<ProcessedTimeline>>> {
    config.validate()?;
    let config = resolved(config);

    if !threading.parallel {
        return Ok(timelines
            .iter()
            .map(|tl| run(tl, options, &config))
            .collect());
    }

    let pool = build_thread_pool(threading.threads)?;
    Ok(pool.install(|| {
        timelines
            .par_iter()
            .map(|tl| run(tl, options, &config))
            .collect()
    }))
}

fn build_thread_pool(threads: Option<usize>) -> TimegridResult<rayon::ThreadPool> {
    if let Some(n) = threads
        && n == 0
    {
        return Err(TimegridError::invalid_argument(
            "batch threading 'threads' must be >= 1 when set",
        ));
    }

    let mut builder = rayon::ThreadPoolBuilder::new();
    if let Some(n) = threads {
        builder = builder.num_threads(n);
    }
    builder
        .build()
        .map_err(|e| anyhow::anyhow!("failed to build rayon thread pool: {e}").into())
}

#[cfg(test)]
#[path = "../tests/unit/pipeline.rs"]
mod tests;
