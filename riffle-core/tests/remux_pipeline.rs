//! Remux pipeline integration test
//!
//! Drives the remuxer through whole-fragment scenarios: contiguous video
//! fragment pairs, 33-bit clock rollover, PTS/DTS damage, audio gap fill
//! and overlap handling, keyframe enforcement on discontinuities, and the
//! init-segment lifecycle.

use bytes::Bytes;
use riffle_core::config::{RemuxConfig, TypeSupported};
use riffle_core::remux::timestamp::PTS_WRAP;
use riffle_core::remux::types::{
    AudioSample, CueSample, DemuxedAudioTrack, DemuxedCueTrack, DemuxedVideoTrack, PlaylistType,
    VideoSample,
};
use riffle_core::remux::Mp4Remuxer;

const TS: u32 = 90_000;

fn new_remuxer() -> Mp4Remuxer {
    Mp4Remuxer::new(
        Box::new(()),
        RemuxConfig::default(),
        TypeSupported::default(),
        "libriffle/1.0",
    )
}

fn video_sample(dts: i64, pts: i64, key: bool, nalu_len: usize) -> VideoSample {
    VideoSample {
        pts,
        dts,
        key,
        units: vec![Bytes::from(vec![0xaa; nalu_len])],
    }
}

fn video_track(samples: Vec<VideoSample>) -> DemuxedVideoTrack {
    DemuxedVideoTrack {
        pid: 256,
        samples,
        input_time_scale: TS,
        codec: "avc1.42c01e".to_string(),
        sps: vec![Bytes::from_static(&[0x67, 0x42, 0xc0, 0x1e, 0xd9])],
        pps: vec![Bytes::from_static(&[0x68, 0xce, 0x3c, 0x80])],
        width: 640,
        height: 360,
        ..Default::default()
    }
}

fn aac_sample(pts: i64, len: usize) -> AudioSample {
    AudioSample {
        pts,
        dts: pts,
        unit: Bytes::from(vec![0x21; len]),
    }
}

fn aac_track(samples: Vec<AudioSample>) -> DemuxedAudioTrack {
    DemuxedAudioTrack {
        pid: 257,
        samples,
        input_time_scale: TS,
        samplerate: 44_100,
        channel_count: 2,
        codec: "mp4a.40.2".to_string(),
        config: Some(Bytes::from_static(&[0x12, 0x10])),
        ..Default::default()
    }
}

fn no_audio() -> DemuxedAudioTrack {
    DemuxedAudioTrack {
        input_time_scale: TS,
        ..Default::default()
    }
}

fn no_video() -> DemuxedVideoTrack {
    DemuxedVideoTrack {
        input_time_scale: TS,
        ..Default::default()
    }
}

fn cue_track() -> DemuxedCueTrack {
    DemuxedCueTrack {
        samples: Vec::new(),
        input_time_scale: TS,
    }
}

/// Per-sample (duration, size, cts) rows of the trun at the end of a moof.
fn trun_samples(moof: &[u8], nb: usize) -> Vec<(u32, u32, i32)> {
    let base = moof.len() - 16 * nb;
    (0..nb)
        .map(|index| {
            let p = base + 16 * index;
            let duration = u32::from_be_bytes(moof[p..p + 4].try_into().unwrap());
            let size = u32::from_be_bytes(moof[p + 4..p + 8].try_into().unwrap());
            let cts = u32::from_be_bytes(moof[p + 12..p + 16].try_into().unwrap()) as i32;
            (duration, size, cts)
        })
        .collect()
}

/// baseMediaDecodeTime of the tfdt box inside a moof.
fn tfdt_base(moof: &[u8]) -> u64 {
    u64::from_be_bytes(moof[60..68].try_into().unwrap())
}

#[test]
fn test_pure_video_contiguous_pair() {
    let mut remuxer = new_remuxer();

    // Fragment A: three samples at a 3003-tick cadence, keyframe first.
    let mut video = video_track(vec![
        video_sample(0, 3003, true, 1000),
        video_sample(3003, 6006, false, 1000),
        video_sample(6006, 9009, false, 1000),
    ]);
    let result = remuxer.remux(
        &mut no_audio(),
        &mut video,
        &mut cue_track(),
        &mut cue_track(),
        0.0,
        true,
        false,
        PlaylistType::Video,
    );

    let init = result.init_segment.expect("init segment on first emit");
    assert!(init.video.is_some());
    assert!(init.audio.is_none());

    let segment = result.video.expect("video segment");
    assert_eq!(segment.nb, 3);
    assert_eq!(segment.start_dts, 0.0);
    assert_eq!(segment.end_dts, 9009.0 / 90_000.0);
    assert_eq!(segment.end_pts, (9009.0 + 3003.0) / 90_000.0);
    for (duration, size, cts) in trun_samples(&segment.moof, 3) {
        assert_eq!(duration, 3003);
        assert_eq!(size, 1004);
        assert_eq!(cts, 3003);
    }
    // mdat accounts for every NAL byte plus per-unit length prefixes
    let sample_bytes: u32 = trun_samples(&segment.moof, 3)
        .iter()
        .map(|(_, size, _)| size)
        .sum();
    assert_eq!(sample_bytes as usize + 8, segment.mdat.len());
    assert_eq!(tfdt_base(&segment.moof), 0);

    // Fragment B joins seamlessly.
    let mut video_b = video_track(vec![
        video_sample(9009, 12_012, true, 1000),
        video_sample(12_012, 15_015, false, 1000),
        video_sample(15_015, 18_018, false, 1000),
    ]);
    video_b.sequence_number = 1;
    let result_b = remuxer.remux(
        &mut no_audio(),
        &mut video_b,
        &mut cue_track(),
        &mut cue_track(),
        9009.0 / 90_000.0,
        true,
        false,
        PlaylistType::Video,
    );
    let segment_b = result_b.video.expect("second video segment");
    assert!(result_b.init_segment.is_none());
    assert_eq!(segment_b.start_dts, segment.end_dts);
    assert_eq!(tfdt_base(&segment_b.moof), 9009);
}

#[test]
fn test_video_rollover_produces_monotone_output() {
    let mut remuxer = new_remuxer();
    let wrap = PTS_WRAP;
    let mut video = video_track(vec![
        video_sample(wrap - 1000, wrap - 1000, true, 100),
        video_sample(wrap - 500, wrap - 500, false, 100),
        video_sample(200, 200, false, 100),
    ]);
    let result = remuxer.remux(
        &mut no_audio(),
        &mut video,
        &mut cue_track(),
        &mut cue_track(),
        0.0,
        true,
        false,
        PlaylistType::Video,
    );
    let segment = result.video.expect("video segment");
    assert_eq!(segment.nb, 3);
    // Anchored at the pre-wrap start; the wrapped sample continues forward.
    assert_eq!(segment.start_dts, 0.0);
    let rows = trun_samples(&segment.moof, 3);
    assert_eq!(rows[0].0, 500);
    assert_eq!(rows[1].0, 700);
    assert!(segment.end_dts > segment.start_dts);
    assert!(segment.end_pts >= segment.end_dts);
}

#[test]
fn test_mild_pts_dts_shift_is_uniform() {
    let mut remuxer = new_remuxer();
    let mut video = video_track(vec![
        video_sample(0, 0, true, 100),
        video_sample(3003, 0, false, 100),
        video_sample(6006, 6006, false, 100),
    ]);
    let result = remuxer.remux(
        &mut no_audio(),
        &mut video,
        &mut cue_track(),
        &mut cue_track(),
        0.0,
        true,
        false,
        PlaylistType::Video,
    );
    let segment = result.video.expect("video segment");
    let rows = trun_samples(&segment.moof, 3);
    // The whole DTS timeline moved back by the shift, keeping the gaps:
    // sample count, sizes and durations are untouched.
    assert_eq!(segment.nb, 3);
    for (duration, size, _) in &rows {
        assert_eq!(*duration, 3003);
        assert_eq!(*size, 104);
    }
    // PTS >= DTS everywhere after repair
    for (_, _, cts) in &rows {
        assert!(*cts >= 0);
    }
    assert_eq!(rows[0].2, 3003); // 0 - (0 - 3003)
    assert_eq!(rows[1].2, 0);
    assert_eq!(segment.start_dts, -3003.0 / 90_000.0);
}

#[test]
fn test_severe_pts_dts_shift_clamps_per_sample() {
    let mut remuxer = new_remuxer();
    // Worst excursion -6600 is beyond twice the 3003 average.
    let mut video = video_track(vec![
        video_sample(0, 0, true, 100),
        video_sample(3003, 3003, false, 100),
        video_sample(6006, -594, false, 100),
    ]);
    let result = remuxer.remux(
        &mut no_audio(),
        &mut video,
        &mut cue_track(),
        &mut cue_track(),
        0.0,
        true,
        false,
        PlaylistType::Video,
    );
    let segment = result.video.expect("video segment");
    let rows = trun_samples(&segment.moof, 3);
    assert_eq!(segment.nb, 3);
    // DTS rebuilt monotone from PTS; composition offsets never negative.
    for (duration, _, cts) in &rows {
        assert!(*cts >= 0);
        assert!(*duration < 10_000);
    }
}

#[test]
fn test_contiguous_hole_absorbed_into_first_sample() {
    let mut remuxer = new_remuxer();
    let mut video = video_track(vec![
        video_sample(0, 3003, true, 100),
        video_sample(3003, 6006, false, 100),
        video_sample(6006, 9009, false, 100),
    ]);
    remuxer.remux(
        &mut no_audio(),
        &mut video,
        &mut cue_track(),
        &mut cue_track(),
        0.0,
        true,
        false,
        PlaylistType::Video,
    );

    // 6006 ticks past the expected join point of 9009.
    let mut video_b = video_track(vec![
        video_sample(15_015, 18_018, true, 100),
        video_sample(18_018, 21_021, false, 100),
        video_sample(21_021, 24_024, false, 100),
    ]);
    let result = remuxer.remux(
        &mut no_audio(),
        &mut video_b,
        &mut cue_track(),
        &mut cue_track(),
        15_015.0 / 90_000.0,
        true,
        false,
        PlaylistType::Video,
    );
    let segment = result.video.expect("video segment");
    // First sample snapped to the join point, widened over the hole.
    assert_eq!(segment.start_dts, 9009.0 / 90_000.0);
    let rows = trun_samples(&segment.moof, 3);
    assert_eq!(rows[0].0, 3003 + 6006);
    assert_eq!(rows[1].0, 3003);
}

#[test]
fn test_contiguous_overlap_snaps_first_sample() {
    let mut remuxer = new_remuxer();
    let mut video = video_track(vec![
        video_sample(0, 3003, true, 100),
        video_sample(3003, 6006, false, 100),
        video_sample(6006, 9009, false, 100),
    ]);
    remuxer.remux(
        &mut no_audio(),
        &mut video,
        &mut cue_track(),
        &mut cue_track(),
        0.0,
        true,
        false,
        PlaylistType::Video,
    );

    // Next fragment starts 3003 ticks before the expected join point.
    let mut video_b = video_track(vec![
        video_sample(6006, 9009, true, 100),
        video_sample(9009, 12_012, false, 100),
        video_sample(12_012, 15_015, false, 100),
    ]);
    let result = remuxer.remux(
        &mut no_audio(),
        &mut video_b,
        &mut cue_track(),
        &mut cue_track(),
        6006.0 / 90_000.0,
        true,
        false,
        PlaylistType::Video,
    );
    let segment = result.video.expect("video segment");
    assert_eq!(segment.start_dts, 9009.0 / 90_000.0);
    assert_eq!(tfdt_base(&segment.moof), 9009);
}

#[test]
fn test_single_video_sample_is_buffered_until_flush() {
    let mut remuxer = new_remuxer();
    let mut video = video_track(vec![video_sample(0, 0, true, 100)]);
    let result = remuxer.remux(
        &mut no_audio(),
        &mut video,
        &mut cue_track(),
        &mut cue_track(),
        0.0,
        true,
        false,
        PlaylistType::Video,
    );
    assert!(result.video.is_none());
    assert!(result.init_segment.is_none());
    // The sample stays queued for the next call.
    assert_eq!(video.samples.len(), 1);

    // A flush forces the emit.
    let result = remuxer.remux(
        &mut no_audio(),
        &mut video,
        &mut cue_track(),
        &mut cue_track(),
        0.0,
        true,
        true,
        PlaylistType::Video,
    );
    let segment = result.video.expect("flushed single-sample segment");
    assert_eq!(segment.nb, 1);
    assert!(video.samples.is_empty());
}

#[test]
fn test_audio_gap_filled_with_silence() {
    let mut remuxer = new_remuxer();
    // 44.1 kHz AAC on a 90 kHz clock: one frame is ~2089.8 ticks. The
    // third frame arrives ten frames late.
    let mut audio = aac_track(vec![
        aac_sample(0, 64),
        aac_sample(2089, 64),
        aac_sample(4178 + 10 * 2089, 64),
    ]);
    let result = remuxer.remux(
        &mut audio,
        &mut no_video(),
        &mut cue_track(),
        &mut cue_track(),
        0.0,
        true,
        false,
        PlaylistType::Audio,
    );
    let segment = result.audio.expect("audio segment");
    assert_eq!(segment.nb, 13, "ten silent frames injected");
    let rows = trun_samples(&segment.moof, 13);
    // Stereo AAC-LC silence is 9 bytes per frame.
    for row in &rows[2..12] {
        assert_eq!(row.1, 9);
        assert_eq!(row.0, 1024, "injected frames stay on the frame grid");
    }
    assert_eq!(rows[0].0, 1024);
    assert_eq!(rows[12].0, 1024, "last sample keeps the nominal duration");
    assert_eq!(segment.mdat.len(), 8 + 3 * 64 + 10 * 9);
    assert_eq!(segment.start_pts, 0.0);
}

#[test]
fn test_audio_head_overlap_reanchors_without_dropping() {
    let mut remuxer = new_remuxer();
    let samples: Vec<AudioSample> = (0..10).map(|i| aac_sample(i * 2090, 64)).collect();
    let mut audio = aac_track(samples);
    let first = remuxer
        .remux(
            &mut audio,
            &mut no_video(),
            &mut cue_track(),
            &mut cue_track(),
            0.0,
            true,
            false,
            PlaylistType::Audio,
        )
        .audio
        .expect("first audio segment");
    let next_pts_ticks = (first.end_pts * 90_000.0).round() as i64;

    // The next fragment starts 10000 ticks behind the expected join.
    let overlap_start = next_pts_ticks - 10_000;
    let mut audio_b = aac_track(
        (0..3)
            .map(|i| aac_sample(overlap_start + i * 2090, 64))
            .collect(),
    );
    audio_b.sequence_number = 1;
    let result = remuxer.remux(
        &mut audio_b,
        &mut no_video(),
        &mut cue_track(),
        &mut cue_track(),
        first.end_pts,
        true,
        false,
        PlaylistType::Audio,
    );
    let segment = result.audio.expect("second audio segment");
    // Head re-anchored onto the overlapping sample, nothing dropped.
    assert_eq!(segment.nb, 3);
    assert!((segment.start_pts - overlap_start as f64 / 90_000.0).abs() < 1e-9);
}

#[test]
fn test_contiguous_audio_joins_exactly() {
    let mut remuxer = new_remuxer();
    let mut audio = aac_track((0..10).map(|i| aac_sample(i * 2090, 64)).collect());
    let first = remuxer
        .remux(
            &mut audio,
            &mut no_video(),
            &mut cue_track(),
            &mut cue_track(),
            0.0,
            true,
            false,
            PlaylistType::Audio,
        )
        .audio
        .expect("first audio segment");

    let start_ticks = (first.end_pts * 90_000.0).round() as i64;
    let mut audio_b = aac_track(
        (0..5)
            .map(|i| aac_sample(start_ticks + i * 2090, 64))
            .collect(),
    );
    let second = remuxer
        .remux(
            &mut audio_b,
            &mut no_video(),
            &mut cue_track(),
            &mut cue_track(),
            first.end_pts,
            true,
            false,
            PlaylistType::Audio,
        )
        .audio
        .expect("second audio segment");
    // Joined within one input-clock tick.
    assert!((second.start_pts - first.end_pts).abs() <= 1.0 / 90_000.0);
}

#[test]
fn test_forced_keyframe_on_discontinuity_drops_leading_samples() {
    let mut remuxer = new_remuxer();
    let mut video = video_track(vec![
        video_sample(0, 3003, false, 100),
        video_sample(3003, 6006, false, 100),
        video_sample(6006, 9009, true, 100),
        video_sample(9009, 12_012, false, 100),
        video_sample(12_012, 15_015, false, 100),
    ]);
    let result = remuxer.remux(
        &mut no_audio(),
        &mut video,
        &mut cue_track(),
        &mut cue_track(),
        0.0,
        true,
        false,
        PlaylistType::Video,
    );
    let segment = result.video.expect("video segment");
    assert_eq!(result.independent, Some(true));
    assert_eq!(segment.first_key_frame, Some(2));
    assert_eq!(segment.independent, Some(true));
    assert_eq!(segment.dropped, 2);
    assert_eq!(segment.nb, 3);
}

#[test]
fn test_no_keyframe_marks_dependent_segment() {
    let mut remuxer = new_remuxer();
    let mut video = video_track(vec![
        video_sample(0, 3003, false, 100),
        video_sample(3003, 6006, false, 100),
        video_sample(6006, 9009, false, 100),
    ]);
    let result = remuxer.remux(
        &mut no_audio(),
        &mut video,
        &mut cue_track(),
        &mut cue_track(),
        0.0,
        true,
        false,
        PlaylistType::Video,
    );
    assert_eq!(result.independent, Some(false));
    let segment = result.video.expect("video segment");
    assert_eq!(segment.first_key_frame, Some(-1));
    assert_eq!(segment.independent, Some(false));
    assert_eq!(segment.nb, 3, "samples are kept, the caller decides");
}

#[test]
fn test_first_fragment_waits_for_both_tracks() {
    let mut remuxer = new_remuxer();
    // Audio is declared but empty: the gate holds everything back.
    let mut audio = aac_track(Vec::new());
    let mut video = video_track(vec![
        video_sample(0, 3003, true, 100),
        video_sample(3003, 6006, false, 100),
    ]);
    let result = remuxer.remux(
        &mut audio,
        &mut video,
        &mut cue_track(),
        &mut cue_track(),
        0.0,
        true,
        false,
        PlaylistType::Video,
    );
    assert!(result.video.is_none());
    assert!(result.init_segment.is_none());
    assert_eq!(video.samples.len(), 2, "video stays queued");
}

#[test]
fn test_av_fragment_emits_both_tracks_with_init() {
    let mut remuxer = new_remuxer();
    let mut audio = aac_track((0..5).map(|i| aac_sample(i * 2090, 64)).collect());
    let mut video = video_track(vec![
        video_sample(0, 3003, true, 500),
        video_sample(3003, 6006, false, 500),
        video_sample(6006, 9009, false, 500),
    ]);
    let result = remuxer.remux(
        &mut audio,
        &mut video,
        &mut cue_track(),
        &mut cue_track(),
        0.0,
        true,
        false,
        PlaylistType::Video,
    );
    let init = result.init_segment.expect("init segment");
    let audio_init = init.audio.expect("audio track init");
    let video_init = init.video.expect("video track init");
    assert_eq!(audio_init.container, "audio/mp4");
    assert_eq!(video_init.container, "video/mp4");
    assert_eq!(video_init.id, "main");
    assert!(!audio_init.init_segment.is_empty());
    assert!(!video_init.init_segment.is_empty());

    let audio_segment = result.audio.expect("audio segment");
    let video_segment = result.video.expect("video segment");
    assert!(audio_segment.has_audio && !audio_segment.has_video);
    assert!(video_segment.has_video && !video_segment.has_audio);
    assert!(video_segment.end_dts >= video_segment.start_dts);
    assert!(audio_segment.end_pts >= audio_segment.start_pts);
}

#[test]
fn test_empty_audio_synthesized_over_video_fragment() {
    let mut remuxer = new_remuxer();
    // First fragment carries both tracks.
    let mut audio = aac_track((0..5).map(|i| aac_sample(i * 2090, 64)).collect());
    let mut video = video_track(vec![
        video_sample(0, 3003, true, 500),
        video_sample(3003, 6006, false, 500),
        video_sample(6006, 9009, false, 500),
    ]);
    remuxer.remux(
        &mut audio,
        &mut video,
        &mut cue_track(),
        &mut cue_track(),
        0.0,
        true,
        false,
        PlaylistType::Video,
    );

    // Second fragment lost its audio: silence spans the video segment.
    let mut audio_b = aac_track(Vec::new());
    let mut video_b = video_track(vec![
        video_sample(9009, 12_012, true, 500),
        video_sample(12_012, 15_015, false, 500),
        video_sample(15_015, 18_018, false, 500),
    ]);
    let result = remuxer.remux(
        &mut audio_b,
        &mut video_b,
        &mut cue_track(),
        &mut cue_track(),
        9009.0 / 90_000.0,
        true,
        false,
        PlaylistType::Video,
    );
    assert!(result.video.is_some());
    let silence = result.audio.expect("synthesized audio segment");
    assert!(silence.nb > 0);
    // Every sample is the 9-byte stereo silent frame.
    assert_eq!(silence.mdat.len(), 8 + silence.nb * 9);
}

#[test]
fn test_init_segment_reissued_identically() {
    let mut remuxer = new_remuxer();
    let samples = vec![
        video_sample(0, 3003, true, 100),
        video_sample(3003, 6006, false, 100),
        video_sample(6006, 9009, false, 100),
    ];
    let mut video = video_track(samples.clone());
    let first = remuxer
        .remux(
            &mut no_audio(),
            &mut video,
            &mut cue_track(),
            &mut cue_track(),
            0.0,
            true,
            false,
            PlaylistType::Video,
        )
        .init_segment
        .expect("first init segment");

    remuxer.reset_init_segment();
    let mut video_b = video_track(samples);
    let second = remuxer
        .remux(
            &mut no_audio(),
            &mut video_b,
            &mut cue_track(),
            &mut cue_track(),
            0.0,
            true,
            false,
            PlaylistType::Video,
        )
        .init_segment
        .expect("re-issued init segment");

    assert_eq!(
        first.video.unwrap().init_segment,
        second.video.unwrap().init_segment
    );
}

#[test]
fn test_id3_and_caption_cues_rebased_to_seconds() {
    let mut remuxer = new_remuxer();
    let mut video = video_track(vec![
        video_sample(0, 3003, true, 100),
        video_sample(3003, 6006, false, 100),
        video_sample(6006, 9009, false, 100),
    ]);
    let mut id3 = DemuxedCueTrack {
        samples: vec![CueSample {
            pts: 90_000,
            dts: 90_000,
            data: Bytes::from_static(b"ID3"),
        }],
        input_time_scale: TS,
    };
    let mut text = DemuxedCueTrack {
        samples: vec![
            CueSample {
                pts: 180_000,
                dts: 180_000,
                data: Bytes::from_static(b"cc2"),
            },
            CueSample {
                pts: 90_000,
                dts: 90_000,
                data: Bytes::from_static(b"cc1"),
            },
        ],
        input_time_scale: TS,
    };
    let result = remuxer.remux(
        &mut no_audio(),
        &mut video,
        &mut id3,
        &mut text,
        0.0,
        true,
        false,
        PlaylistType::Video,
    );
    let id3_cues = result.id3.expect("id3 cues");
    assert_eq!(id3_cues.samples.len(), 1);
    // (raw - initPTS) / timescale relative to session start
    assert!((id3_cues.samples[0].pts - (90_000.0 - 3003.0) / 90_000.0).abs() < 1e-9);

    let text_cues = result.text.expect("caption cues");
    assert_eq!(text_cues.samples.len(), 2);
    assert!(text_cues.samples[0].pts < text_cues.samples[1].pts);
    assert!(id3.samples.is_empty());
    assert!(text.samples.is_empty());
}

#[test]
fn test_raw_mpeg_audio_skips_mp4_wrapping() {
    let mut remuxer = Mp4Remuxer::new(
        Box::new(()),
        RemuxConfig::default(),
        TypeSupported {
            mp4: true,
            mpeg: true,
            mp3: false,
        },
        "libriffle/1.0",
    );
    let mut audio = DemuxedAudioTrack {
        pid: 257,
        samples: vec![
            AudioSample {
                pts: 0,
                dts: 0,
                unit: Bytes::from(vec![0xff; 417]),
            },
            AudioSample {
                pts: 2351,
                dts: 2351,
                unit: Bytes::from(vec![0xff; 417]),
            },
        ],
        input_time_scale: TS,
        samplerate: 44_100,
        channel_count: 2,
        codec: "mp3".to_string(),
        is_aac: false,
        config: Some(Bytes::new()),
        ..Default::default()
    };
    let result = remuxer.remux(
        &mut audio,
        &mut no_video(),
        &mut cue_track(),
        &mut cue_track(),
        0.0,
        true,
        false,
        PlaylistType::Audio,
    );
    let init = result.init_segment.expect("init segment");
    let audio_init = init.audio.expect("audio init");
    assert_eq!(audio_init.container, "audio/mpeg");
    assert!(audio_init.codec.is_empty());
    assert!(audio_init.init_segment.is_empty());

    let segment = result.audio.expect("audio segment");
    assert!(segment.moof.is_empty(), "raw MPEG has no movie fragment");
    // No mdat header: bare frame concatenation
    assert_eq!(segment.mdat.len(), 2 * 417);
    assert_eq!(segment.nb, 2);
}

#[test]
fn test_mp3_in_mp4_keeps_container() {
    let mut remuxer = Mp4Remuxer::new(
        Box::new(()),
        RemuxConfig::default(),
        TypeSupported {
            mp4: true,
            mpeg: false,
            mp3: true,
        },
        "libriffle/1.0",
    );
    let mut audio = DemuxedAudioTrack {
        pid: 257,
        samples: vec![AudioSample {
            pts: 0,
            dts: 0,
            unit: Bytes::from(vec![0xff; 417]),
        }],
        input_time_scale: TS,
        samplerate: 44_100,
        channel_count: 2,
        codec: "mp4a.40.34".to_string(),
        is_aac: false,
        config: Some(Bytes::new()),
        ..Default::default()
    };
    let result = remuxer.remux(
        &mut audio,
        &mut no_video(),
        &mut cue_track(),
        &mut cue_track(),
        0.0,
        true,
        false,
        PlaylistType::Audio,
    );
    let init = result.init_segment.expect("init segment");
    let audio_init = init.audio.expect("audio init");
    assert_eq!(audio_init.container, "audio/mp4");
    assert_eq!(audio_init.codec, "mp3");
    assert!(!audio_init.init_segment.is_empty());

    let segment = result.audio.expect("audio segment");
    assert!(!segment.moof.is_empty());
    assert_eq!(segment.mdat.len(), 8 + 417);
}

#[test]
fn test_sequence_numbers_advance_per_track() {
    let mut remuxer = new_remuxer();
    let mut video = video_track(vec![
        video_sample(0, 3003, true, 100),
        video_sample(3003, 6006, false, 100),
        video_sample(6006, 9009, false, 100),
    ]);
    remuxer.remux(
        &mut no_audio(),
        &mut video,
        &mut cue_track(),
        &mut cue_track(),
        0.0,
        true,
        false,
        PlaylistType::Video,
    );
    assert_eq!(video.sequence_number, 1);

    let mut video_b = video_track(vec![
        video_sample(9009, 12_012, true, 100),
        video_sample(12_012, 15_015, false, 100),
    ]);
    video_b.sequence_number = video.sequence_number;
    let result = remuxer.remux(
        &mut no_audio(),
        &mut video_b,
        &mut cue_track(),
        &mut cue_track(),
        9009.0 / 90_000.0,
        true,
        false,
        PlaylistType::Video,
    );
    assert_eq!(video_b.sequence_number, 2);
    // mfhd carries the pre-increment sequence number
    let segment = result.video.unwrap();
    let seq = u32::from_be_bytes(segment.moof[20..24].try_into().unwrap());
    assert_eq!(seq, 1);
}
