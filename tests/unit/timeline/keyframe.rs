use super::*;
use crate::timeline::model::{Clip, Track, TrackItem, TrackKind};

const KFS: [f64; 5] = [100.0, 110.0, 120.0, 130.0, 140.0];

/// Deterministic xorshift64 in `[0, 1)`.
struct Rng(u64);

impl Rng {
    fn next_f64(&mut self) -> f64 {
        self.0 ^= self.0 << 13;
        self.0 ^= self.0 >> 7;
        self.0 ^= self.0 << 17;
        (self.0 >> 11) as f64 / (1u64 << 53) as f64
    }
}

#[test]
fn align_within_threshold_only() {
    assert_eq!(align_to_keyframes(101.0, &KFS, 3.0).unwrap(), 100.0);
    assert_eq!(align_to_keyframes(108.0, &KFS, 3.0).unwrap(), 110.0);
    assert_eq!(align_to_keyframes(106.0, &KFS, 3.0).unwrap(), 106.0);
    assert_eq!(align_to_keyframes(106.0, &KFS, 4.0).unwrap(), 110.0);
    assert_eq!(align_to_keyframes(150.0, &KFS, 3.0).unwrap(), 150.0);
    assert_eq!(align_to_keyframes(120.0, &KFS, 0.0).unwrap(), 120.0);
}

#[test]
fn align_ties_go_to_later_keyframe() {
    assert_eq!(align_to_keyframes(105.0, &KFS, 5.0).unwrap(), 110.0);
    // Input order does not matter.
    let shuffled = [130.0, 100.0, 140.0, 110.0, 120.0];
    assert_eq!(align_to_keyframes(125.0, &shuffled, 5.0).unwrap(), 130.0);
}

#[test]
fn align_without_keyframes_is_identity() {
    assert_eq!(align_to_keyframes(42.0, &[], 10.0).unwrap(), 42.0);
    assert!(align_to_keyframes(42.0, &[-1.0], 10.0).is_err());
}

#[test]
fn optimal_keyframe_modes() {
    use KeyframePreference::*;
    assert_eq!(find_optimal_keyframe(105.0, &KFS, Previous).unwrap(), 100.0);
    assert_eq!(find_optimal_keyframe(105.0, &KFS, Next).unwrap(), 110.0);
    assert_eq!(find_optimal_keyframe(105.0, &KFS, Nearest).unwrap(), 110.0);
    assert_eq!(find_optimal_keyframe(103.0, &KFS, Nearest).unwrap(), 100.0);

    assert_eq!(find_optimal_keyframe(110.0, &KFS, Previous).unwrap(), 110.0);
    assert_eq!(find_optimal_keyframe(110.0, &KFS, Next).unwrap(), 120.0);

    assert_eq!(find_optimal_keyframe(95.0, &KFS, Previous).unwrap(), 100.0);
    assert_eq!(find_optimal_keyframe(150.0, &KFS, Next).unwrap(), 140.0);

    assert_eq!(find_optimal_keyframe(77.0, &[], Next).unwrap(), 77.0);
    assert_eq!(find_optimal_keyframe(103.0, &KFS, ContentWeighted).unwrap(), 100.0);
}

#[test]
fn content_weighted_blends_distance_and_weight() {
    let kfs = [
        WeightedKeyframe { position: 100.0, weight: Some(0.9) },
        WeightedKeyframe { position: 110.0, weight: Some(0.1) },
    ];
    let pick = find_optimal_weighted_keyframe(105.0, &kfs, KeyframePreference::ContentWeighted);
    assert_eq!(pick.unwrap(), 100.0);

    // Close enough wins over weight.
    let pick = find_optimal_weighted_keyframe(109.0, &kfs, KeyframePreference::ContentWeighted);
    assert_eq!(pick.unwrap(), 110.0);

    let plain = [
        WeightedKeyframe { position: 100.0, weight: None },
        WeightedKeyframe { position: 110.0, weight: None },
    ];
    let pick = find_optimal_weighted_keyframe(104.0, &plain, KeyframePreference::ContentWeighted);
    assert_eq!(pick.unwrap(), 100.0);

    let pick = find_optimal_weighted_keyframe(104.0, &kfs, KeyframePreference::Next);
    assert_eq!(pick.unwrap(), 110.0);
}

#[test]
fn cut_points_prefer_previous_keyframe() {
    let cuts = [103.0, 112.0, 116.0, 142.0];
    let out = optimize_cut_points(&cuts, &KFS, 5.0).unwrap();
    assert_eq!(out, vec![100.0, 110.0, 120.0, 140.0]);
}

#[test]
fn cut_points_fall_back_to_next_then_forced_spacing() {
    let cuts = [142.0, 116.0, 112.0, 103.0];
    let out = optimize_cut_points(&cuts, &KFS, 15.0).unwrap();
    assert_eq!(out, vec![100.0, 120.0, 135.0, 150.0]);
}

#[test]
fn cut_points_without_keyframes_keep_spacing() {
    let out = optimize_cut_points(&[0.0, 3.0, 30.0], &[], 10.0).unwrap();
    assert_eq!(out, vec![0.0, 10.0, 30.0]);
    assert!(optimize_cut_points(&[], &KFS, 10.0).unwrap().is_empty());
    assert!(optimize_cut_points(&[1.0], &KFS, -1.0).is_err());
}

#[test]
fn weighted_tie_goes_to_later_position_regardless_of_input_order() {
    let kfs = [
        WeightedKeyframe { position: 110.0, weight: Some(0.5) },
        WeightedKeyframe { position: 100.0, weight: Some(0.5) },
    ];
    let pick = find_optimal_weighted_keyframe(105.0, &kfs, KeyframePreference::ContentWeighted);
    assert_eq!(pick.unwrap(), 110.0);
}

#[test]
fn first_cut_is_spaced_from_timeline_origin() {
    let kfs = [0.0, 2.0, 4.0];
    assert_eq!(optimize_cut_points(&[0.3, 5.0], &kfs, 1.0).unwrap(), vec![2.0, 4.0]);
    assert_eq!(
        optimize_cut_points(&[0.0, 0.3, 5.0], &kfs, 1.0).unwrap(),
        vec![0.0, 2.0, 4.0]
    );
    assert_eq!(optimize_cut_points(&[0.5, 3.0], &[], 1.0).unwrap(), vec![1.0, 3.0]);
}

#[test]
fn cut_points_respect_min_segment_for_random_inputs() {
    let mut rng = Rng(0xDEAD_BEEF_CAFE_F00D);
    for round in 0..200 {
        let n_cuts = 1 + (rng.next_f64() * 40.0) as usize;
        let n_kfs = (rng.next_f64() * 30.0) as usize;
        let cuts: Vec<f64> = (0..n_cuts).map(|_| (rng.next_f64() * 1_000.0).round()).collect();
        let kfs: Vec<f64> = (0..n_kfs).map(|_| (rng.next_f64() * 1_000.0).round()).collect();
        let min = 1.0 + (rng.next_f64() * 60.0).round();

        let out = optimize_cut_points(&cuts, &kfs, min).unwrap();
        assert_eq!(out.len(), cuts.len());
        assert!(out[0] == 0.0 || out[0] >= min - 1e-9, "round {round}: first cut {}", out[0]);
        for pair in out.windows(2) {
            assert!(
                pair[1] - pair[0] >= min - 1e-9,
                "round {round}: {} -> {} with min {min}",
                pair[0],
                pair[1]
            );
        }
    }
}

#[test]
fn timeline_boundaries_become_thinned_keyframes() {
    let mut tl = Timeline::new(30.0);
    tl.clips.push(Clip::new(0.0, 30.0));
    tl.clips.push(Clip::new(30.0, 45.0));
    tl.tracks.push(Track::new(
        TrackKind::Audio,
        vec![TrackItem::new(45.0, 90.0)],
    ));

    assert_eq!(
        extract_keyframes_from_timeline(&tl, 0.5).unwrap(),
        vec![0.0, 1.0, 1.5, 3.0]
    );
    assert_eq!(
        extract_keyframes_from_timeline(&tl, 0.6).unwrap(),
        vec![0.0, 1.0, 3.0]
    );
    assert_eq!(
        extract_keyframes_from_timeline(&Timeline::new(30.0), 0.5).unwrap(),
        Vec::<f64>::new()
    );
}

fn three_track_timeline() -> Timeline {
    let fps = 30.0;
    let mut tl = Timeline::new(fps);
    tl.tracks.push(Track::new(
        TrackKind::Video,
        vec![TrackItem::with_times(0.0, 30.0, fps)],
    ));
    tl.tracks.push(Track::new(TrackKind::Audio, vec![TrackItem::new(0.0, 31.0)]));
    tl.tracks.push(Track::new(TrackKind::Text, vec![TrackItem::new(1.0, 32.0)]));
    tl
}

#[test]
fn sync_snaps_clustered_boundaries_to_mean_frame() {
    let tl = three_track_timeline();
    let out = synchronize_keyframes_across_tracks(&tl, 0.05).unwrap();

    let ends: Vec<f64> = out.tracks.iter().map(|t| t.items[0].span.end_frame).collect();
    assert_eq!(ends, vec![31.0, 31.0, 31.0]);
    let starts: Vec<f64> = out.tracks.iter().map(|t| t.items[0].span.start_frame).collect();
    assert_eq!(starts, vec![0.0, 0.0, 0.0]);

    let video = &out.tracks[0].items[0].span;
    assert!((video.end_time.unwrap() - 31.0 / 30.0).abs() < 1e-12);
    assert_eq!(out.tracks[1].items[0].span.end_time, None);
}

#[test]
fn sync_with_tiny_offset_changes_nothing() {
    let tl = three_track_timeline();
    let out = synchronize_keyframes_across_tracks(&tl, 0.01).unwrap();
    assert_eq!(out, tl);
}

fn one_frame_apart_timeline() -> Timeline {
    let mut tl = Timeline::new(30.0);
    tl.tracks.push(Track::new(TrackKind::Video, vec![TrackItem::new(0.0, 90.0)]));
    tl.tracks.push(Track::new(TrackKind::Audio, vec![TrackItem::new(0.0, 91.0)]));
    tl
}

fn item_ends(tl: &Timeline) -> Vec<f64> {
    tl.tracks.iter().map(|t| t.items[0].span.end_frame).collect()
}

#[test]
fn sync_window_of_one_frame_merges_neighbouring_boundaries() {
    let tl = one_frame_apart_timeline();
    let half = synchronize_keyframes_across_tracks(&tl, 0.5 / 30.0).unwrap();
    assert_eq!(item_ends(&half), vec![90.0, 91.0]);

    let full = synchronize_keyframes_across_tracks(&tl, 1.0 / 30.0 + 1e-9).unwrap();
    let ends = item_ends(&full);
    assert_eq!(ends[0], ends[1]);
    assert!(ends[0] == 90.0 || ends[0] == 91.0);
}

#[test]
fn optimize_timeline_merges_cuts_one_frame_apart_across_tracks() {
    let tl = one_frame_apart_timeline();
    let info = VideoInfo {
        duration: 4.0,
        keyframes: vec![0.0, 3.0, 91.0 / 30.0],
        timeline: None,
    };
    let out = KeyframeAligner::default()
        .optimize_timeline_keyframes(&tl, Some(&info), Strictness::Low)
        .unwrap();

    let ends = item_ends(&out);
    assert_eq!(ends[0], ends[1]);
    assert!(ends[0] == 90.0 || ends[0] == 91.0);
    assert_eq!(out.tracks[0].items[0].span.start_frame, 0.0);
}

#[test]
fn strictness_parameters() {
    assert_eq!(Strictness::Low.params(), (5.0, 0.5));
    assert_eq!(Strictness::Medium.params(), (3.0, 1.0));
    assert_eq!(Strictness::High.params(), (1.0, 2.0));
    assert_eq!("HIGH".parse::<Strictness>().unwrap(), Strictness::High);
    assert!("extreme".parse::<Strictness>().is_err());
    assert_eq!(Strictness::default(), Strictness::Medium);
}

#[test]
fn keyframe_sources_resolve_in_priority_order() {
    let aligner = KeyframeAligner::default();
    let mut info = VideoInfo {
        duration: 12.0,
        keyframes: vec![4.0, 0.0, 2.0],
        timeline: None,
    };
    assert_eq!(KeyframeSource::Auto.resolve(&info), KeyframeSource::Metadata);
    assert_eq!(
        aligner.extract_keyframes(&info, KeyframeSource::Auto).unwrap(),
        vec![0.0, 2.0, 4.0]
    );
    assert_eq!(
        aligner.extract_keyframes(&info, KeyframeSource::Uniform).unwrap(),
        vec![0.0, 5.0, 10.0]
    );

    info.keyframes.clear();
    assert_eq!(KeyframeSource::Auto.resolve(&info), KeyframeSource::Uniform);

    let mut tl = Timeline::new(25.0);
    tl.clips.push(Clip::new(0.0, 50.0));
    info.timeline = Some(tl);
    assert_eq!(KeyframeSource::Auto.resolve(&info), KeyframeSource::Timeline);
    assert_eq!(
        aligner.extract_keyframes(&info, KeyframeSource::Auto).unwrap(),
        vec![0.0, 2.0]
    );
    assert!(aligner
        .extract_keyframes(&info, KeyframeSource::Metadata)
        .unwrap()
        .is_empty());
}

#[test]
fn optimize_timeline_snaps_clips_and_spaces_track_cuts() {
    let fps = 30.0;
    let mut tl = Timeline::new(fps);
    tl.clips.push(Clip::with_times(2.0, 58.0, fps));
    tl.tracks.push(Track::new(
        TrackKind::Video,
        vec![TrackItem::new(0.0, 62.0), TrackItem::new(62.0, 118.0)],
    ));
    let info = VideoInfo {
        duration: 6.0,
        keyframes: vec![0.0, 2.0, 4.0, 6.0],
        timeline: None,
    };

    let out = KeyframeAligner::default()
        .optimize_timeline_keyframes(&tl, Some(&info), Strictness::Low)
        .unwrap();

    let clip = &out.clips[0].span;
    assert_eq!((clip.start_frame, clip.end_frame), (0.0, 60.0));
    assert_eq!(clip.start_time, Some(0.0));
    assert_eq!(clip.end_time, Some(2.0));

    let items: Vec<(f64, f64)> = out.tracks[0]
        .items
        .iter()
        .map(|i| (i.span.start_frame, i.span.end_frame))
        .collect();
    assert_eq!(items, vec![(0.0, 60.0), (60.0, 120.0)]);
}

#[test]
fn optimize_timeline_high_strictness_leaves_far_boundaries() {
    let fps = 30.0;
    let mut tl = Timeline::new(fps);
    tl.clips.push(Clip::new(2.0, 58.0));
    let info = VideoInfo {
        duration: 6.0,
        keyframes: vec![0.0, 2.0, 4.0, 6.0],
        timeline: None,
    };
    let out = KeyframeAligner::default()
        .optimize_timeline_keyframes(&tl, Some(&info), Strictness::High)
        .unwrap();
    assert_eq!(out.clips[0].span.start_frame, 2.0);
    assert_eq!(out.clips[0].span.end_frame, 58.0);
}

#[test]
fn optimize_timeline_without_keyframes_is_noop() {
    let tl = Timeline::new(30.0);
    let out = KeyframeAligner::default()
        .optimize_timeline_keyframes(&tl, None, Strictness::Medium)
        .unwrap();
    assert_eq!(out, tl);
}

#[test]
fn alignment_report_counts_and_ranks() {
    let mut tl = Timeline::new(25.0);
    tl.clips.push(Clip::new(0.0, 50.0));
    tl.clips.push(Clip::new(50.0, 130.0));

    let aligner = KeyframeAligner::default();
    let report = aligner
        .analyze_keyframe_alignment(&tl, Some(&[0.0, 2.0, 5.0]))
        .unwrap();
    assert_eq!(report.total_cut_points, 3);
    assert_eq!(report.aligned_cuts, 2);
    assert_eq!(report.non_aligned_cuts, 1);
    assert!((report.alignment_rate - 2.0 / 3.0).abs() < 1e-12);
    assert!((report.avg_misalignment - 0.2).abs() < 1e-9);
    assert_eq!(report.misaligned_cuts.len(), 1);
    assert_eq!(report.misaligned_cuts[0].nearest_keyframe, 5.0);

    let own = aligner.analyze_keyframe_alignment(&tl, None).unwrap();
    assert_eq!(own.aligned_cuts, 3);
    assert_eq!(own.alignment_rate, 1.0);

    let none = aligner.analyze_keyframe_alignment(&tl, Some(&[])).unwrap();
    assert_eq!(none.total_cut_points, 3);
    assert_eq!(none.aligned_cuts + none.non_aligned_cuts, 0);
}

#[test]
fn alignment_report_keeps_ten_worst() {
    let mut tl = Timeline::new(10.0);
    for i in 0..15 {
        let start = 100.0 * i as f64 + 50.0;
        tl.clips.push(Clip::new(start, start + 1.0 + i as f64));
    }
    let report = KeyframeAligner::default()
        .analyze_keyframe_alignment(&tl, Some(&[0.0]))
        .unwrap();
    assert_eq!(report.misaligned_cuts.len(), 10);
    for pair in report.misaligned_cuts.windows(2) {
        assert!(pair[0].distance >= pair[1].distance);
    }
}
