//! Audio remuxing: frame normalization, silent-gap fill, overlap handling
//! and empty-segment synthesis.
//!
//! AAC frames have a constant duration, so the remuxer keeps every frame on
//! a fixed PTS grid anchored at the expected fragment join point. Gap and
//! overlap arithmetic runs on `f64` within a single call because the input
//! clock rarely divides evenly by the MP4 timescale; only the cross-call
//! state is stored in integer ticks.

use bytes::Bytes;
use tracing::{debug, warn};

use crate::mp4;
use crate::remux::remuxer::Mp4Remuxer;
use crate::remux::silence::silent_frame;
use crate::remux::timestamp::normalize_pts;
use crate::remux::types::{
    AudioSample, DemuxedAudioTrack, Mp4Sample, RemuxedTrack, SampleFlags, TrackType,
};
use crate::remux::{
    AAC_SAMPLES_PER_FRAME, MAX_SILENT_FRAME_DURATION_MS, MPEG_AUDIO_SAMPLES_PER_FRAME,
};

/// A frame on the fractional working timeline of one remux call.
struct Frame {
    pts: f64,
    unit: Bytes,
}

fn silence_codec(track: &DemuxedAudioTrack) -> &str {
    track.manifest_codec.as_deref().unwrap_or(&track.codec)
}

impl Mp4Remuxer {
    #[allow(clippy::too_many_lines)]
    pub(crate) fn remux_audio(
        &mut self,
        track: &mut DemuxedAudioTrack,
        time_offset: f64,
        contiguous: bool,
        accurate_time_offset: bool,
        video_time_offset: Option<f64>,
    ) -> Option<RemuxedTrack> {
        let input_time_scale = track.input_time_scale;
        let its = f64::from(input_time_scale);
        let mp4_time_scale = if track.samplerate != 0 {
            track.samplerate
        } else {
            input_time_scale
        };
        let scale_factor = its / f64::from(mp4_time_scale);
        let mp4_sample_duration = if track.is_aac {
            AAC_SAMPLES_PER_FRAME
        } else {
            MPEG_AUDIO_SAMPLES_PER_FRAME
        };
        let input_sample_duration = f64::from(mp4_sample_duration) * scale_factor;
        let init_pts = self.init_pts?;
        let raw_mpeg = !track.is_aac && self.type_supported.mpeg;
        let aligned_with_video = video_time_offset.is_some();

        let mut samples = std::mem::take(&mut track.samples);
        let time_offset_ticks = time_offset * its;
        let reference = Some(time_offset_ticks.round() as i64);
        let state_next_pts = self.next_audio_pts.unwrap_or(-1);

        // A fragment joins seamlessly when its declared offset, or its
        // first sample, lands close enough to the expected join point.
        let mut contiguous = contiguous;
        if !samples.is_empty() && state_next_pts > 0 {
            let offset_drift = (time_offset_ticks - state_next_pts as f64).abs();
            let sample_drift =
                (normalize_pts(samples[0].pts - init_pts, reference) - state_next_pts).abs();
            contiguous = contiguous
                || (accurate_time_offset && offset_drift < 9000.0)
                || (sample_drift as f64) < 20.0 * input_sample_duration;
        }
        self.is_audio_contiguous = contiguous;

        for sample in &mut samples {
            sample.pts = normalize_pts(sample.pts - init_pts, reference);
        }
        let mut frames: Vec<Frame> = samples
            .into_iter()
            .map(|sample| Frame {
                pts: sample.pts as f64,
                unit: sample.unit,
            })
            .collect();

        let mut next_audio_pts = state_next_pts as f64;
        if !contiguous || next_audio_pts < 0.0 {
            // Samples with negative PTS are unplayable; keeping them would
            // shift the whole fragment forward onto its neighbor.
            frames.retain(|frame| frame.pts >= 0.0);
            if frames.is_empty() {
                return None;
            }
            if video_time_offset == Some(0.0) {
                // Match the video start so leading gaps get silence-filled.
                next_audio_pts = 0.0;
            } else if accurate_time_offset {
                next_audio_pts = time_offset_ticks.max(0.0);
            } else {
                next_audio_pts = frames[0].pts;
            }
        }

        if track.is_aac {
            let max_drift =
                f64::from(self.config.max_audio_frames_drift) * input_sample_duration;
            let mut next_pts = next_audio_pts;
            let mut index = 0usize;
            while index < frames.len() {
                let pts = frames[index].pts;
                let delta = pts - next_pts;
                if delta <= -max_drift && aligned_with_video {
                    // Overlap. Only the head re-anchors; later overlapping
                    // frames pass through unchanged.
                    if index == 0 {
                        warn!(
                            "audio frame @ {:.3}s overlaps expected PTS by {} ms",
                            pts / its,
                            (-1000.0 * delta / its).round()
                        );
                        next_audio_pts = pts;
                        next_pts = pts;
                    }
                } else if delta >= max_drift
                    && (1000.0 * delta / its).abs() < MAX_SILENT_FRAME_DURATION_MS
                    && aligned_with_video
                {
                    let mut missing = (delta / input_sample_duration).round() as i64;
                    // Back the anchor off the current frame so injected
                    // silence stays on the media PTS grid.
                    next_pts = pts - missing as f64 * input_sample_duration;
                    if next_pts < 0.0 {
                        missing -= 1;
                        next_pts += input_sample_duration;
                    }
                    if index == 0 {
                        next_audio_pts = next_pts;
                    }
                    warn!(
                        "injecting {missing} audio frame(s) @ {:.3}s due to {} ms gap",
                        next_pts / its,
                        (1000.0 * delta / its).round()
                    );
                    for _ in 0..missing {
                        let stamp = next_pts.max(0.0);
                        let fill = silent_frame(silence_codec(track), track.channel_count)
                            .unwrap_or_else(|| {
                                debug!(
                                    "no silent frame for {}, duplicating current frame",
                                    silence_codec(track)
                                );
                                frames[index].unit.clone()
                            });
                        frames.insert(index, Frame { pts: stamp, unit: fill });
                        next_pts += input_sample_duration;
                        index += 1;
                    }
                }
                frames[index].pts = next_pts;
                next_pts += input_sample_duration;
                index += 1;
            }
        }

        if frames.is_empty() {
            return None;
        }

        let header_len = if raw_mpeg { 0usize } else { 8usize };
        let payload_len: usize = frames.iter().map(|frame| frame.unit.len()).sum();
        let mdat_size = header_len + payload_len;
        let mut mdat = self.alloc_mdat(TrackType::Audio, mdat_size)?;
        if !raw_mpeg {
            mdat[0..4].copy_from_slice(&(mdat_size as u32).to_be_bytes());
            mdat[4..8].copy_from_slice(b"mdat");
        }

        let mut output: Vec<Mp4Sample> = Vec::with_capacity(frames.len());
        let mut first_pts = 0.0f64;
        let mut last_pts: Option<f64> = None;
        let mut offset = header_len;
        for frame in &frames {
            let mut pts = frame.pts;
            if let Some(previous) = last_pts {
                if let Some(previous_sample) = output.last_mut() {
                    previous_sample.duration = ((pts - previous) / scale_factor).round() as u32;
                }
            } else {
                if contiguous && track.is_aac {
                    // Force an exact join with the previous fragment.
                    pts = next_audio_pts;
                }
                first_pts = pts;
            }
            mdat[offset..offset + frame.unit.len()].copy_from_slice(&frame.unit);
            offset += frame.unit.len();
            // The last sample keeps this nominal frame duration.
            output.push(Mp4Sample {
                size: frame.unit.len() as u32,
                duration: mp4_sample_duration,
                cts: 0,
                flags: SampleFlags::from_keyframe(true),
            });
            last_pts = Some(pts);
        }

        let nb = output.len();
        let last_duration = output.last().map_or(0, |sample| sample.duration);
        let last_pts_value = last_pts.unwrap_or(first_pts);
        let end_pts = last_pts_value + scale_factor * f64::from(last_duration);
        self.next_audio_pts = Some(end_pts.round() as i64);
        self.is_audio_contiguous = true;

        let sequence_number = track.sequence_number;
        track.sequence_number += 1;
        let moof = if raw_mpeg {
            Bytes::new()
        } else {
            Bytes::from(mp4::moof(
                sequence_number,
                (first_pts / scale_factor) as i64,
                mp4::AUDIO_TRACK_ID,
                &output,
            ))
        };

        let start_seconds = first_pts / its;
        let end_seconds = end_pts / its;
        Some(RemuxedTrack {
            moof,
            mdat: Bytes::from(mdat),
            start_pts: start_seconds,
            end_pts: end_seconds,
            start_dts: start_seconds,
            end_dts: end_seconds,
            track_type: TrackType::Audio,
            has_audio: true,
            has_video: false,
            nb,
            dropped: 0,
            independent: None,
            first_key_frame: None,
        })
    }

    /// Synthesizes a pure-silence audio segment spanning a video fragment
    /// when the audio track delivered no samples.
    pub(crate) fn remux_empty_audio(
        &mut self,
        track: &mut DemuxedAudioTrack,
        time_offset: f64,
        contiguous: bool,
        video_start_dts: f64,
        video_end_dts: f64,
    ) -> Option<RemuxedTrack> {
        let input_time_scale = track.input_time_scale;
        let its = f64::from(input_time_scale);
        let mp4_time_scale = if track.samplerate != 0 {
            track.samplerate
        } else {
            input_time_scale
        };
        let scale_factor = its / f64::from(mp4_time_scale);
        let init_dts = self.init_dts? as f64;

        // Continue from the expected join point when one is known, else
        // from the video fragment start.
        let start = self
            .next_audio_pts
            .map_or(video_start_dts * its, |pts| pts as f64)
            + init_dts;
        let end = video_end_dts * its + init_dts;
        let frame_duration = scale_factor * f64::from(AAC_SAMPLES_PER_FRAME);
        let count = ((end - start) / frame_duration).ceil() as i64;
        if count <= 0 {
            return None;
        }
        let Some(silent) = silent_frame(silence_codec(track), track.channel_count) else {
            debug!(
                "cannot synthesize empty audio: no silent frame for {}",
                silence_codec(track)
            );
            return None;
        };
        warn!(
            "remuxing {:.3}s of empty audio over the video fragment",
            (end - start) / its
        );
        track.samples = (0..count)
            .map(|index| {
                let stamp = (start + index as f64 * frame_duration).round() as i64;
                AudioSample {
                    pts: stamp,
                    dts: stamp,
                    unit: silent.clone(),
                }
            })
            .collect();
        self.remux_audio(track, time_offset, contiguous, false, None)
    }
}
