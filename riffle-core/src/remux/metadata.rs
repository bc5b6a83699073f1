//! Rebase of timed ID3 and caption cues into the presentation clock.
//!
//! Cue tracks carry no `mdat`; their samples only need timestamps rewritten
//! from the rolling 33-bit transport clock to seconds from session start.
//! Both flushers drain the source track by moving its sample vector out.

use crate::remux::timestamp::normalize_pts;
use crate::remux::types::{DemuxedCueTrack, FlushedCue, FlushedCues};

/// Rebases ID3 metadata cues and drains the track.
///
/// PTS is anchored on `init_pts`, DTS on `init_dts`, both against the
/// fragment start so rollover between cue and fragment is resolved.
pub fn flush_metadata_cues(
    track: &mut DemuxedCueTrack,
    time_offset: f64,
    init_pts: i64,
    init_dts: i64,
) -> Option<FlushedCues> {
    if track.samples.is_empty() {
        return None;
    }
    let input_time_scale = f64::from(track.input_time_scale);
    let reference = Some((time_offset * input_time_scale).round() as i64);
    let samples = std::mem::take(&mut track.samples)
        .into_iter()
        .map(|sample| FlushedCue {
            pts: normalize_pts(sample.pts - init_pts, reference) as f64 / input_time_scale,
            dts: normalize_pts(sample.dts - init_dts, reference) as f64 / input_time_scale,
            data: sample.data,
        })
        .collect();
    Some(FlushedCues { samples })
}

/// Rebases caption user-data cues, sorts them by presentation time and
/// drains the track.
pub fn flush_userdata_cues(
    track: &mut DemuxedCueTrack,
    time_offset: f64,
    init_pts: i64,
) -> Option<FlushedCues> {
    if track.samples.is_empty() {
        return None;
    }
    let input_time_scale = f64::from(track.input_time_scale);
    let reference = Some((time_offset * input_time_scale).round() as i64);
    let mut samples: Vec<FlushedCue> = std::mem::take(&mut track.samples)
        .into_iter()
        .map(|sample| {
            let pts = normalize_pts(sample.pts - init_pts, reference) as f64 / input_time_scale;
            FlushedCue {
                pts,
                dts: pts,
                data: sample.data,
            }
        })
        .collect();
    samples.sort_by(|a, b| a.pts.total_cmp(&b.pts));
    Some(FlushedCues { samples })
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;

    use super::*;
    use crate::remux::timestamp::PTS_WRAP;
    use crate::remux::types::CueSample;

    fn cue(pts: i64, dts: i64) -> CueSample {
        CueSample {
            pts,
            dts,
            data: Bytes::from_static(b"cue"),
        }
    }

    #[test]
    fn test_metadata_cues_rebase_to_seconds() {
        let mut track = DemuxedCueTrack {
            samples: vec![cue(90_000, 90_000), cue(180_000, 180_000)],
            input_time_scale: 90_000,
        };
        let flushed = flush_metadata_cues(&mut track, 0.0, 0, 0).unwrap();
        assert_eq!(flushed.samples.len(), 2);
        assert!((flushed.samples[0].pts - 1.0).abs() < 1e-9);
        assert!((flushed.samples[1].pts - 2.0).abs() < 1e-9);
        assert!(track.samples.is_empty());
    }

    #[test]
    fn test_metadata_cues_resolve_rollover() {
        // Cue timestamp wrapped while the fragment offset did not.
        let mut track = DemuxedCueTrack {
            samples: vec![cue(100, 100)],
            input_time_scale: 90_000,
        };
        let flushed = flush_metadata_cues(&mut track, (PTS_WRAP - 9000) as f64 / 90_000.0, 0, 0)
            .unwrap();
        let expected = (PTS_WRAP + 100) as f64 / 90_000.0;
        assert!((flushed.samples[0].pts - expected).abs() < 1e-6);
    }

    #[test]
    fn test_userdata_cues_sorted_by_pts() {
        let mut track = DemuxedCueTrack {
            samples: vec![cue(180_000, 180_000), cue(90_000, 90_000)],
            input_time_scale: 90_000,
        };
        let flushed = flush_userdata_cues(&mut track, 0.0, 0).unwrap();
        assert!(flushed.samples[0].pts < flushed.samples[1].pts);
        assert!(track.samples.is_empty());
    }

    #[test]
    fn test_empty_track_flushes_nothing() {
        let mut track = DemuxedCueTrack {
            samples: Vec::new(),
            input_time_scale: 90_000,
        };
        assert!(flush_metadata_cues(&mut track, 0.0, 0, 0).is_none());
        assert!(flush_userdata_cues(&mut track, 0.0, 0).is_none());
    }
}
