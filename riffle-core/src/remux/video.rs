//! Video remuxing: sample ordering, timestamp repair and `moof`/`mdat`
//! assembly for AVC tracks.

use bytes::Bytes;
use tracing::{debug, warn};

use crate::mp4;
use crate::remux::PTS_DTS_SHIFT_TOLERANCE_90KHZ;
use crate::remux::remuxer::Mp4Remuxer;
use crate::remux::timestamp::normalize_pts;
use crate::remux::types::{DemuxedVideoTrack, Mp4Sample, RemuxedTrack, SampleFlags, TrackType};

impl Mp4Remuxer {
    #[allow(clippy::too_many_lines)]
    pub(crate) fn remux_video(
        &mut self,
        track: &mut DemuxedVideoTrack,
        time_offset: f64,
        contiguous: bool,
        audio_track_length: f64,
    ) -> Option<RemuxedTrack> {
        let time_scale = track.input_time_scale;
        let ts = f64::from(time_scale);
        let anchor = self.init_dts?;
        let mut input_samples = std::mem::take(&mut track.samples);
        let nb_samples = input_samples.len();
        if nb_samples == 0 {
            return None;
        }

        // Fragment anchor: reuse the expected join point when contiguous,
        // else derive it from the declared offset minus the first sample's
        // composition offset so that frame presents at the requested time.
        let next_avc_dts = match self.next_avc_dts {
            Some(value) if contiguous => value,
            _ => {
                let pts = (time_offset * ts).round() as i64;
                let cts = input_samples[0].pts
                    - normalize_pts(input_samples[0].dts, Some(input_samples[0].pts));
                pts - cts
            }
        };

        // Monotonize all timestamps against the anchor; track decode-order
        // violations and the worst PTS < DTS excursion.
        let reference = Some(next_avc_dts);
        let mut pts_dts_shift: i64 = 0;
        let mut sort_samples = false;
        let mut previous_dts: Option<i64> = None;
        for sample in &mut input_samples {
            sample.pts = normalize_pts(sample.pts - anchor, reference);
            sample.dts = normalize_pts(sample.dts - anchor, reference);
            if sample.dts > sample.pts {
                pts_dts_shift = pts_dts_shift
                    .min(sample.pts - sample.dts)
                    .max(-PTS_DTS_SHIFT_TOLERANCE_90KHZ);
            }
            if previous_dts.is_some_and(|previous| sample.dts < previous) {
                sort_samples = true;
            }
            previous_dts = Some(sample.dts);
        }
        if sort_samples {
            input_samples.sort_by(|a, b| a.dts.cmp(&b.dts).then(a.pts.cmp(&b.pts)));
        }

        let mut first_dts = input_samples[0].dts;
        let last_dts = input_samples[nb_samples - 1].dts;

        // Nominal sample duration: average DTS delta across the batch.
        let input_duration = last_dts - first_dts;
        let average_sample_duration = if input_duration != 0 {
            ((input_duration as f64) / (nb_samples as f64 - 1.0)).round() as i64
        } else {
            i64::from(time_scale / 30)
        };

        if pts_dts_shift < 0 {
            if pts_dts_shift < -2 * average_sample_duration {
                // Severe: rebuild DTS from PTS, keeping it monotone and
                // widening composition offsets.
                warn!(
                    "PTS < DTS in video samples, deriving DTS from PTS minus {average_sample_duration} ticks"
                );
                let mut running_dts = pts_dts_shift;
                for sample in &mut input_samples {
                    running_dts = running_dts.max(sample.pts - average_sample_duration);
                    sample.dts = running_dts;
                    sample.pts = sample.pts.max(running_dts);
                }
            } else {
                warn!("PTS < DTS in video samples, shifting DTS by {pts_dts_shift} ticks");
                for sample in &mut input_samples {
                    sample.dts += pts_dts_shift;
                }
            }
            first_dts = input_samples[0].dts;
        }

        // Absorb inter-fragment holes and overlaps into the first sample so
        // consecutive fragments join without buffer gaps.
        if contiguous {
            let delta = first_dts - next_avc_dts;
            let found_hole = delta > average_sample_duration;
            let found_overlap = delta < -1;
            if found_hole || found_overlap {
                let delta_ms = (delta as f64 * 1000.0 / ts).round();
                if found_hole {
                    warn!(
                        "{delta_ms} ms ({delta} dts) hole between AVC fragments detected at {time_offset:.3}s"
                    );
                } else {
                    warn!(
                        "{} ms ({delta} dts) overlap between AVC fragments detected at {time_offset:.3}s",
                        -delta_ms
                    );
                }
                first_dts = next_avc_dts;
                let first_pts = input_samples[0].pts - delta;
                input_samples[0].dts = first_dts;
                input_samples[0].pts = first_pts;
                debug!("video first PTS/DTS adjusted to {first_pts}/{first_dts}");
            }
        }

        if self.quirks.requires_positive_dts {
            first_dts = first_dts.max(0);
        }

        // mdat layout: every NAL unit is prefixed with its 4-byte length.
        let mut nalu_count = 0usize;
        let mut payload_len = 0usize;
        for sample in &input_samples {
            nalu_count += sample.units.len();
            payload_len += sample.payload_len();
        }
        let mdat_size = payload_len + 4 * nalu_count + 8;
        let mut mdat = self.alloc_mdat(TrackType::Video, mdat_size)?;
        mdat[0..4].copy_from_slice(&(mdat_size as u32).to_be_bytes());
        mdat[4..8].copy_from_slice(b"mdat");

        let mut min_pts = i64::MAX;
        let mut max_pts = i64::MIN;
        for sample in &input_samples {
            min_pts = min_pts.min(sample.pts);
            max_pts = max_pts.max(sample.pts);
        }

        let mut output: Vec<Mp4Sample> = Vec::with_capacity(nb_samples);
        let mut offset = 8usize;
        let mut stretched_last_frame = false;
        let mut last_duration: i64 = 0;
        for index in 0..nb_samples {
            let sample = &input_samples[index];
            let mut sample_len = 0usize;
            for unit in &sample.units {
                mdat[offset..offset + 4].copy_from_slice(&(unit.len() as u32).to_be_bytes());
                offset += 4;
                mdat[offset..offset + unit.len()].copy_from_slice(unit);
                offset += unit.len();
                sample_len += 4 + unit.len();
            }

            let duration = if index < nb_samples - 1 {
                input_samples[index + 1].dts - sample.dts
            } else {
                let last_frame_duration = if index > 0 {
                    sample.dts - input_samples[index - 1].dts
                } else {
                    average_sample_duration
                };
                if self.config.stretch_short_video_track && self.next_audio_pts.is_some() {
                    // The audio track can outlast the video track. When the
                    // distance to the next fragment exceeds the tolerated
                    // hole, inflate the final frame over the difference so
                    // playback does not stall.
                    let gap_tolerance =
                        (f64::from(self.config.max_buffer_hole) * ts).floor() as i64;
                    let frame_end = if audio_track_length > 0.0 {
                        min_pts + (audio_track_length * ts).round() as i64
                    } else {
                        self.next_audio_pts.unwrap_or_default()
                    };
                    let delta_to_frame_end = frame_end - sample.pts;
                    if delta_to_frame_end > gap_tolerance {
                        let stretched =
                            (delta_to_frame_end - last_frame_duration).max(last_frame_duration);
                        if stretched > last_frame_duration {
                            stretched_last_frame = true;
                        }
                        debug!(
                            "{} ms to the next segment; using {} ms for the last video frame",
                            (delta_to_frame_end as f64 * 1000.0 / ts).round(),
                            (stretched as f64 * 1000.0 / ts).round()
                        );
                        stretched
                    } else {
                        last_frame_duration
                    }
                } else {
                    last_frame_duration
                }
            };
            last_duration = duration;

            let cts = (sample.pts - sample.dts).clamp(i64::from(i32::MIN), i64::from(i32::MAX));
            output.push(Mp4Sample {
                size: sample_len as u32,
                duration: duration.max(0) as u32,
                cts: cts as i32,
                flags: SampleFlags::from_keyframe(sample.key),
            });
        }

        if self.quirks.force_first_sample_sync() {
            // Affected engines reject fragments whose first sample is not
            // marked as a random access point.
            if let Some(first) = output.first_mut() {
                first.flags.depends_on = 2;
                first.flags.is_non_sync = 0;
            }
        }

        // The join point advances on the natural cadence even when the
        // final frame was stretched.
        let advance = if stretched_last_frame || last_duration == 0 {
            average_sample_duration
        } else {
            last_duration
        };
        let next_dts = last_dts + advance;
        self.next_avc_dts = Some(next_dts);
        self.is_video_contiguous = true;

        let sequence_number = track.sequence_number;
        track.sequence_number += 1;
        let moof = Bytes::from(mp4::moof(
            sequence_number,
            first_dts,
            mp4::VIDEO_TRACK_ID,
            &output,
        ));
        let dropped = track.dropped;
        track.dropped = 0;

        Some(RemuxedTrack {
            moof,
            mdat: Bytes::from(mdat),
            start_pts: min_pts as f64 / ts,
            end_pts: (max_pts + advance) as f64 / ts,
            start_dts: first_dts as f64 / ts,
            end_dts: next_dts as f64 / ts,
            track_type: TrackType::Video,
            has_audio: false,
            has_video: true,
            nb: nb_samples,
            dropped,
            independent: None,
            first_key_frame: None,
        })
    }
}
