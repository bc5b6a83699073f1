//! The stateful remuxer: session anchors, contiguity tracking,
//! init-segment generation and per-fragment orchestration.

use tracing::{debug, warn};

use crate::config::{RemuxConfig, TypeSupported};
use crate::mp4;
use crate::remux::metadata::{flush_metadata_cues, flush_userdata_cues};
use crate::remux::quirks::EngineQuirks;
use crate::remux::timestamp::{PTS_WRAP_PROBE, normalize_pts};
use crate::remux::types::{
    DemuxedAudioTrack, DemuxedCueTrack, DemuxedVideoTrack, InitSegmentData, MuxError, NO_PID,
    PlaylistType, RemuxObserver, RemuxerResult, TrackInitData, TrackMetadata, TrackType,
    VideoSample,
};

/// Remuxes demuxed elementary-stream fragments into fragmented-MP4 media
/// segments.
///
/// One instance lives per media pipeline. Calls are synchronous and
/// non-reentrant: each [`Mp4Remuxer::remux`] completes before the next
/// begins, and the per-track counters and expected timestamps advance
/// monotonically across calls.
pub struct Mp4Remuxer {
    pub(crate) observer: Box<dyn RemuxObserver>,
    pub(crate) config: RemuxConfig,
    pub(crate) type_supported: TypeSupported,
    pub(crate) quirks: EngineQuirks,
    /// Session anchor for presentation timestamps, on the input clock.
    pub(crate) init_pts: Option<i64>,
    /// Session anchor for decode timestamps, on the input clock.
    pub(crate) init_dts: Option<i64>,
    /// DTS where the next video fragment is expected to start.
    pub(crate) next_avc_dts: Option<i64>,
    /// PTS where the next audio fragment is expected to start.
    pub(crate) next_audio_pts: Option<i64>,
    /// Whether the init segment for the current track configuration was
    /// emitted.
    pub(crate) init_segment_generated: bool,
    pub(crate) is_video_contiguous: bool,
    pub(crate) is_audio_contiguous: bool,
}

impl Mp4Remuxer {
    /// Creates a remuxer bound to an event sink and a host engine.
    ///
    /// `vendor` is the host identifier string; engine quirks are derived
    /// from it once per process and cached.
    pub fn new(
        observer: Box<dyn RemuxObserver>,
        config: RemuxConfig,
        type_supported: TypeSupported,
        vendor: &str,
    ) -> Self {
        let quirks = EngineQuirks::detect(vendor);
        debug!(
            "remuxer created, requires_positive_dts={}",
            quirks.requires_positive_dts
        );
        Self {
            observer,
            config,
            type_supported,
            quirks,
            init_pts: None,
            init_dts: None,
            next_avc_dts: None,
            next_audio_pts: None,
            init_segment_generated: false,
            is_video_contiguous: false,
            is_audio_contiguous: false,
        }
    }

    /// Resets both session anchors, typically to re-align the timeline to a
    /// program-date-time reference.
    pub fn reset_timestamp(&mut self, default_init_pts: Option<i64>) {
        debug!("init PTS/DTS reset to {:?}", default_init_pts);
        self.init_pts = default_init_pts;
        self.init_dts = default_init_pts;
    }

    /// Clears both contiguity flags, used on seek or discontinuity.
    pub fn reset_next_timestamp(&mut self) {
        debug!("next timestamps reset");
        self.is_video_contiguous = false;
        self.is_audio_contiguous = false;
    }

    /// Forces the init segment to be re-emitted, used on codec change.
    pub fn reset_init_segment(&mut self) {
        debug!("init segment flag reset");
        self.init_segment_generated = false;
    }

    /// Remuxes one demuxed fragment.
    ///
    /// Until both declared tracks have delivered enough samples the call
    /// returns an empty result so that the first emitted fragment always
    /// carries both streams; `flush` overrides that gate at fragment end.
    #[allow(clippy::too_many_arguments, clippy::too_many_lines)]
    pub fn remux(
        &mut self,
        audio: &mut DemuxedAudioTrack,
        video: &mut DemuxedVideoTrack,
        id3: &mut DemuxedCueTrack,
        text: &mut DemuxedCueTrack,
        time_offset: f64,
        accurate_time_offset: bool,
        flush: bool,
        playlist_type: PlaylistType,
    ) -> RemuxerResult {
        let mut result = RemuxerResult::default();

        let has_audio = audio.pid > NO_PID;
        let has_video = video.pid > NO_PID;
        let enough_audio = !audio.samples.is_empty();
        let enough_video = video.samples.len() > 1;
        let emit_video = enough_video || (flush && !video.samples.is_empty());

        let can_remux = ((!has_audio || enough_audio) && (!has_video || enough_video))
            || self.init_segment_generated
            || flush;

        if can_remux {
            if !self.init_segment_generated {
                result.init_segment = self.generate_init_segment(audio, video, time_offset);
            }

            let is_video_contiguous = self.is_video_contiguous;
            let mut audio_time_offset = time_offset;
            let mut video_time_offset = time_offset;
            let mut first_key_frame: i32 = -1;

            if emit_video {
                first_key_frame = video
                    .samples
                    .iter()
                    .position(|sample| sample.key)
                    .map_or(-1, |index| index as i32);

                if !is_video_contiguous && self.config.force_key_frame_on_discontinuity {
                    result.independent = Some(true);
                    if first_key_frame > 0 {
                        warn!(
                            "dropping {} out of {} video samples before a keyframe",
                            first_key_frame,
                            video.samples.len()
                        );
                        let start_pts = video_start_pts(&video.samples);
                        video.samples.drain(..first_key_frame as usize);
                        video.dropped += first_key_frame as u32;
                        let new_start = video.samples.first().map_or(start_pts, |s| s.pts);
                        video_time_offset +=
                            (new_start - start_pts) as f64 / f64::from(video.input_time_scale);
                    } else if first_key_frame == -1 {
                        warn!(
                            "no keyframe found out of {} video samples",
                            video.samples.len()
                        );
                        result.independent = Some(false);
                    }
                }
            }

            if self.init_segment_generated {
                if emit_video {
                    if let Some(first_audio) = audio.samples.first() {
                        // Offset each track by the non-negative half of the
                        // start-time delta; never pull a track backwards.
                        let start_pts = video_start_pts(&video.samples);
                        let ts_delta =
                            normalize_pts(first_audio.pts, Some(start_pts)) - start_pts;
                        let delta_seconds = ts_delta as f64 / f64::from(video.input_time_scale);
                        audio_time_offset += delta_seconds.max(0.0);
                        video_time_offset += (-delta_seconds).max(0.0);
                    }
                }

                // Audio first, so the video remuxer can consult the audio
                // end timestamp when stretching its last frame.
                if enough_audio {
                    if audio.samplerate == 0 {
                        warn!("regenerating init segment: audio samplerate unknown at first emit");
                        result.init_segment =
                            self.generate_init_segment(audio, video, time_offset);
                    }
                    let video_offset_for_audio = (has_video
                        || emit_video
                        || playlist_type == PlaylistType::Audio)
                        .then_some(video_time_offset);
                    result.audio = self.remux_audio(
                        audio,
                        audio_time_offset,
                        self.is_audio_contiguous,
                        accurate_time_offset,
                        video_offset_for_audio,
                    );
                    if emit_video {
                        let audio_track_length = result
                            .audio
                            .as_ref()
                            .map_or(0.0, |segment| segment.end_pts - segment.start_pts);
                        if video.input_time_scale == 0 {
                            warn!(
                                "regenerating init segment: video timescale unknown at first emit"
                            );
                            result.init_segment =
                                self.generate_init_segment(audio, video, time_offset);
                        }
                        result.video = self.remux_video(
                            video,
                            video_time_offset,
                            is_video_contiguous,
                            audio_track_length,
                        );
                    }
                } else if emit_video {
                    result.video =
                        self.remux_video(video, video_time_offset, is_video_contiguous, 0.0);
                    if let Some(segment) = result.video.as_ref() {
                        if has_audio && !audio.codec.is_empty() {
                            let (video_start, video_end) = (segment.start_dts, segment.end_dts);
                            result.audio = self.remux_empty_audio(
                                audio,
                                audio_time_offset,
                                self.is_audio_contiguous,
                                video_start,
                                video_end,
                            );
                        }
                    }
                }

                if let Some(segment) = result.video.as_mut() {
                    segment.first_key_frame = Some(first_key_frame);
                    segment.independent = Some(first_key_frame != -1);
                }
            }
        }

        if self.init_segment_generated {
            if let (Some(init_pts), Some(init_dts)) = (self.init_pts, self.init_dts) {
                if !id3.samples.is_empty() {
                    result.id3 = flush_metadata_cues(id3, time_offset, init_pts, init_dts);
                }
                if !text.samples.is_empty() {
                    result.text = flush_userdata_cues(text, time_offset, init_pts);
                }
            }
        }

        result
    }

    /// Computes session anchors and emits per-track init segments once the
    /// track configurations are known.
    pub(crate) fn generate_init_segment(
        &mut self,
        audio: &mut DemuxedAudioTrack,
        video: &mut DemuxedVideoTrack,
        time_offset: f64,
    ) -> Option<InitSegmentData> {
        let compute_anchors = self.init_pts.is_none();
        let mut init_pts = i64::MAX;
        let mut init_dts = i64::MAX;
        let mut timescale = 0u32;
        let mut audio_init = None;
        let mut video_init = None;

        if audio.config.is_some() && !audio.samples.is_empty() {
            // Integer frames per timescale tick: using the sampling rate as
            // the MP4 timescale removes AV-sync rounding drift.
            audio.timescale = audio.samplerate;
            let mut container = "audio/mp4";
            if !audio.is_aac {
                if self.type_supported.mpeg {
                    // Raw MPEG audio has no init segment.
                    container = "audio/mpeg";
                    audio.codec = String::new();
                } else if self.type_supported.mp3 {
                    audio.codec = "mp3".to_string();
                }
            }
            let init_bytes = if !audio.is_aac && self.type_supported.mpeg {
                bytes::Bytes::new()
            } else {
                bytes::Bytes::from(mp4::audio_init_segment(audio))
            };
            audio_init = Some(TrackInitData {
                id: "audio",
                container,
                codec: audio.codec.clone(),
                init_segment: init_bytes,
                metadata: TrackMetadata::Audio {
                    channel_count: audio.channel_count,
                },
            });
            timescale = audio.input_time_scale;
            if compute_anchors {
                let start_offset =
                    (f64::from(audio.input_time_scale) * time_offset).round() as i64;
                init_pts = audio.samples[0].pts - start_offset;
                init_dts = init_pts;
            }
        }

        if !video.sps.is_empty() && !video.pps.is_empty() && !video.samples.is_empty() {
            video.timescale = video.input_time_scale;
            video_init = Some(TrackInitData {
                id: "main",
                container: "video/mp4",
                codec: video.codec.clone(),
                init_segment: bytes::Bytes::from(mp4::video_init_segment(video)),
                metadata: TrackMetadata::Video {
                    width: video.width,
                    height: video.height,
                },
            });
            timescale = video.input_time_scale;
            if compute_anchors {
                let start_pts = video_start_pts(&video.samples);
                let start_offset =
                    (f64::from(video.input_time_scale) * time_offset).round() as i64;
                init_dts = init_dts
                    .min(normalize_pts(video.samples[0].dts, Some(start_pts)) - start_offset);
                init_pts = init_pts.min(start_pts - start_offset);
            }
        }

        if audio_init.is_none() && video_init.is_none() {
            return None;
        }

        self.init_segment_generated = true;
        if compute_anchors {
            debug!("initPTS/initDTS computed: {}/{}", init_pts, init_dts);
            self.init_pts = Some(init_pts);
            self.init_dts = Some(init_dts);
        }
        Some(InitSegmentData {
            audio: audio_init,
            video: video_init,
            init_pts: self.init_pts.unwrap_or(init_pts),
            timescale,
        })
    }

    /// Allocates an `mdat` buffer, reporting failure as a non-fatal event.
    pub(crate) fn alloc_mdat(&self, track_type: TrackType, bytes: usize) -> Option<Vec<u8>> {
        let mut buffer: Vec<u8> = Vec::new();
        if let Err(err) = buffer.try_reserve_exact(bytes) {
            let error = MuxError::Allocation {
                track_type,
                bytes,
                reason: err.to_string(),
            };
            warn!("{error}");
            self.observer.on_mux_error(&error);
            return None;
        }
        buffer.resize(bytes, 0);
        Some(buffer)
    }
}

/// Earliest presentation timestamp of a sample batch, resolving 33-bit
/// rollover inside the batch against the running minimum.
pub(crate) fn video_start_pts(samples: &[VideoSample]) -> i64 {
    let mut start = samples.first().map_or(0, |sample| sample.pts);
    for sample in samples {
        let delta = sample.pts - start;
        if delta < -PTS_WRAP_PROBE {
            start = normalize_pts(start, Some(sample.pts));
        } else if delta <= 0 {
            start = sample.pts;
        }
    }
    start
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remux::timestamp::PTS_WRAP;

    fn sample(pts: i64, dts: i64) -> VideoSample {
        VideoSample {
            pts,
            dts,
            key: false,
            units: Vec::new(),
        }
    }

    #[test]
    fn test_video_start_pts_plain_minimum() {
        let samples = vec![sample(3003, 0), sample(6006, 3003), sample(9009, 6006)];
        assert_eq!(video_start_pts(&samples), 3003);
    }

    #[test]
    fn test_video_start_pts_out_of_order() {
        let samples = vec![sample(6006, 0), sample(3003, 3003)];
        assert_eq!(video_start_pts(&samples), 3003);
    }

    #[test]
    fn test_video_start_pts_across_rollover() {
        // The second sample wrapped: the minimum is re-expressed in the
        // wrapped sample's frame instead of treating the wrap as a rewind.
        let samples = vec![sample(PTS_WRAP - 1000, 0), sample(200, 0)];
        assert_eq!(video_start_pts(&samples), -1000);
    }

    #[test]
    fn test_reset_next_timestamp_clears_contiguity() {
        let mut remuxer = Mp4Remuxer::new(
            Box::new(()),
            RemuxConfig::default(),
            TypeSupported::default(),
            "libriffle/1.0",
        );
        remuxer.is_video_contiguous = true;
        remuxer.is_audio_contiguous = true;
        remuxer.reset_next_timestamp();
        assert!(!remuxer.is_video_contiguous);
        assert!(!remuxer.is_audio_contiguous);
    }

    #[test]
    fn test_reset_timestamp_overrides_anchors() {
        let mut remuxer = Mp4Remuxer::new(
            Box::new(()),
            RemuxConfig::default(),
            TypeSupported::default(),
            "libriffle/1.0",
        );
        remuxer.reset_timestamp(Some(42));
        assert_eq!(remuxer.init_pts, Some(42));
        assert_eq!(remuxer.init_dts, Some(42));
        remuxer.reset_timestamp(None);
        assert_eq!(remuxer.init_pts, None);
    }
}
