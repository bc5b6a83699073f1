//! Data model for the remuxer: demuxed inputs, fragmented-MP4 outputs and
//! the event seam back to the hosting pipeline.
//!
//! Sample payloads are carried as [`bytes::Bytes`] so that moving them from
//! the demuxer into the remuxer and on to the media sink never copies frame
//! data. Track sample vectors are moved out of the track structs on remux;
//! the demuxer observes its queue emptying through that ownership transfer
//! rather than through a shared buffer.

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Sentinel PID meaning the elementary stream was never seen in the
/// program map.
pub const NO_PID: i32 = -1;

/// One demuxed AVC access unit.
#[derive(Debug, Clone)]
pub struct VideoSample {
    /// Presentation timestamp on the input clock, modulo 2^33.
    pub pts: i64,
    /// Decoding timestamp on the input clock, modulo 2^33.
    pub dts: i64,
    /// IDR / keyframe flag.
    pub key: bool,
    /// NAL units of the access unit, without start codes or length
    /// prefixes.
    pub units: Vec<Bytes>,
}

impl VideoSample {
    /// Total payload length of all NAL units, excluding length prefixes.
    pub fn payload_len(&self) -> usize {
        self.units.iter().map(Bytes::len).sum()
    }
}

/// One demuxed audio frame.
#[derive(Debug, Clone)]
pub struct AudioSample {
    /// Presentation timestamp on the input clock, modulo 2^33.
    pub pts: i64,
    /// Decoding timestamp on the input clock, modulo 2^33.
    pub dts: i64,
    /// The frame payload: one raw AAC access unit or one MPEG audio frame.
    pub unit: Bytes,
}

/// One timed metadata or user-data cue on the input clock.
#[derive(Debug, Clone)]
pub struct CueSample {
    /// Presentation timestamp on the input clock, modulo 2^33.
    pub pts: i64,
    /// Decoding timestamp on the input clock, modulo 2^33.
    pub dts: i64,
    /// Raw cue payload (ID3 frame or caption user data).
    pub data: Bytes,
}

/// A cue rebased into the presentation clock.
#[derive(Debug, Clone)]
pub struct FlushedCue {
    /// Presentation time in seconds from session start.
    pub pts: f64,
    /// Decode time in seconds from session start.
    pub dts: f64,
    /// Raw cue payload, unchanged.
    pub data: Bytes,
}

/// Demuxed AVC video track handed to [`super::Mp4Remuxer::remux`].
#[derive(Debug, Clone)]
pub struct DemuxedVideoTrack {
    /// Elementary-stream PID, or [`NO_PID`] when the stream is undeclared.
    pub pid: i32,
    /// Access units queued since the previous remux call.
    pub samples: Vec<VideoSample>,
    /// Clock the sample timestamps are expressed on, in Hz.
    pub input_time_scale: u32,
    /// MP4 track timescale; selected during init-segment generation.
    pub timescale: u32,
    /// RFC 6381 codec string, e.g. `avc1.64001f`.
    pub codec: String,
    /// Sequence parameter sets for the active configuration.
    pub sps: Vec<Bytes>,
    /// Picture parameter sets for the active configuration.
    pub pps: Vec<Bytes>,
    /// Coded width in pixels.
    pub width: u32,
    /// Coded height in pixels.
    pub height: u32,
    /// Samples discarded upstream or by keyframe enforcement.
    pub dropped: u32,
    /// Per-track fragment counter, incremented on every emitted segment.
    pub sequence_number: u32,
}

impl Default for DemuxedVideoTrack {
    fn default() -> Self {
        Self {
            pid: NO_PID,
            samples: Vec::new(),
            input_time_scale: 0,
            timescale: 0,
            codec: String::new(),
            sps: Vec::new(),
            pps: Vec::new(),
            width: 0,
            height: 0,
            dropped: 0,
            sequence_number: 0,
        }
    }
}

/// Demuxed audio track handed to [`super::Mp4Remuxer::remux`].
#[derive(Debug, Clone)]
pub struct DemuxedAudioTrack {
    /// Elementary-stream PID, or [`NO_PID`] when the stream is undeclared.
    pub pid: i32,
    /// Frames queued since the previous remux call.
    pub samples: Vec<AudioSample>,
    /// Clock the sample timestamps are expressed on, in Hz.
    pub input_time_scale: u32,
    /// MP4 track timescale; selected during init-segment generation.
    pub timescale: u32,
    /// Sampling rate in Hz, 0 until the first frame header was parsed.
    pub samplerate: u32,
    /// Channel count from the decoder configuration.
    pub channel_count: u32,
    /// RFC 6381 codec string, e.g. `mp4a.40.2`.
    pub codec: String,
    /// Codec string announced by the playlist, when it differs from the
    /// parsed one.
    pub manifest_codec: Option<String>,
    /// True for AAC, false for MPEG audio (layer II/III).
    pub is_aac: bool,
    /// Decoder configuration (AudioSpecificConfig); empty for MPEG audio.
    pub config: Option<Bytes>,
    /// Samples discarded upstream.
    pub dropped: u32,
    /// Per-track fragment counter, incremented on every emitted segment.
    pub sequence_number: u32,
}

impl Default for DemuxedAudioTrack {
    fn default() -> Self {
        Self {
            pid: NO_PID,
            samples: Vec::new(),
            input_time_scale: 0,
            timescale: 0,
            samplerate: 0,
            channel_count: 0,
            codec: String::new(),
            manifest_codec: None,
            is_aac: true,
            config: None,
            dropped: 0,
            sequence_number: 0,
        }
    }
}

/// Demuxed timed-cue track (ID3 metadata or CEA-608/708 user data).
#[derive(Debug, Clone, Default)]
pub struct DemuxedCueTrack {
    /// Cues queued since the previous remux call.
    pub samples: Vec<CueSample>,
    /// Clock the cue timestamps are expressed on, in Hz.
    pub input_time_scale: u32,
}

/// Which media a track or segment carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TrackType {
    /// Audio elementary stream.
    Audio,
    /// Video elementary stream.
    Video,
}

impl std::fmt::Display for TrackType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TrackType::Audio => write!(f, "audio"),
            TrackType::Video => write!(f, "video"),
        }
    }
}

/// Kind of playlist the fragment belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PlaylistType {
    /// Alternate audio rendition playlist.
    Audio,
    /// Main (video) playlist.
    Video,
    /// Subtitle playlist.
    Subtitle,
}

/// `trun` sample dependency flags (ISO/IEC 14496-12, 8.8.3.1).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SampleFlags {
    /// Leading-sample classification; always 0 here.
    pub is_leading: u8,
    /// 2 for sync samples, 1 for samples depending on others.
    pub depends_on: u8,
    /// Whether other samples depend on this one; always 0 here.
    pub is_depended_on: u8,
    /// Redundant-coding classification; always 0 here.
    pub has_redundancy: u8,
    /// Sample padding value; always 0 here.
    pub padding_value: u8,
    /// 1 when the sample is not a sync sample.
    pub is_non_sync: u8,
    /// Degradation priority; always 0 here.
    pub degrad_prio: u16,
}

impl SampleFlags {
    /// Flags for a sample with the given keyframe property.
    pub fn from_keyframe(key: bool) -> Self {
        Self {
            is_leading: 0,
            depends_on: if key { 2 } else { 1 },
            is_depended_on: 0,
            has_redundancy: 0,
            padding_value: 0,
            is_non_sync: u8::from(!key),
            degrad_prio: 0,
        }
    }
}

/// One output sample as enumerated by the `trun` box.
#[derive(Debug, Clone, Copy)]
pub struct Mp4Sample {
    /// Sample size in bytes within `mdat`.
    pub size: u32,
    /// Sample duration in the track timescale.
    pub duration: u32,
    /// Composition-time offset (PTS - DTS) in the track timescale.
    pub cts: i32,
    /// Dependency flags.
    pub flags: SampleFlags,
}

/// An emitted media segment for one track.
#[derive(Debug, Clone)]
pub struct RemuxedTrack {
    /// The `moof` box. Empty for raw MPEG audio, which carries no movie
    /// fragment metadata.
    pub moof: Bytes,
    /// The `mdat` box (or bare frame concatenation for raw MPEG audio).
    pub mdat: Bytes,
    /// First presentation time in seconds from session start.
    pub start_pts: f64,
    /// Presentation end time in seconds from session start.
    pub end_pts: f64,
    /// First decode time in seconds from session start.
    pub start_dts: f64,
    /// Decode end time in seconds from session start.
    pub end_dts: f64,
    /// Which media the segment carries.
    pub track_type: TrackType,
    /// True when the segment carries audio samples.
    pub has_audio: bool,
    /// True when the segment carries video samples.
    pub has_video: bool,
    /// Number of samples in the segment.
    pub nb: usize,
    /// Samples dropped while assembling this fragment.
    pub dropped: u32,
    /// Whether the segment starts on a keyframe. Video only.
    pub independent: Option<bool>,
    /// Index of the first keyframe in the input batch, -1 when absent.
    /// Video only.
    pub first_key_frame: Option<i32>,
}

/// Init-segment description for a single track.
#[derive(Debug, Clone)]
pub struct TrackInitData {
    /// Track identifier within the returned set (`"audio"` or `"main"`).
    pub id: &'static str,
    /// Output container MIME type.
    pub container: &'static str,
    /// RFC 6381 codec string; empty for raw MPEG audio.
    pub codec: String,
    /// Serialized `ftyp` + `moov`; empty for raw MPEG audio.
    pub init_segment: Bytes,
    /// Codec-level facts the media pipeline surfaces to the player.
    pub metadata: TrackMetadata,
}

/// Per-track facts attached to the init segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackMetadata {
    /// Audio decoder layout.
    Audio {
        /// Channel count from the decoder configuration.
        channel_count: u32,
    },
    /// Video coded size.
    Video {
        /// Coded width in pixels.
        width: u32,
        /// Coded height in pixels.
        height: u32,
    },
}

/// The init-segment artifact returned when track configuration is first
/// known (or re-issued after a codec change).
#[derive(Debug, Clone)]
pub struct InitSegmentData {
    /// Audio track description, when an audio track was recorded.
    pub audio: Option<TrackInitData>,
    /// Video track description, when a video track was recorded.
    pub video: Option<TrackInitData>,
    /// Session anchor timestamp on the input clock.
    pub init_pts: i64,
    /// Clock the anchor is expressed on, in Hz.
    pub timescale: u32,
}

/// Cues rebased into the presentation clock and drained from the source
/// track.
#[derive(Debug, Clone, Default)]
pub struct FlushedCues {
    /// The rebased cues.
    pub samples: Vec<FlushedCue>,
}

/// Everything a single [`super::Mp4Remuxer::remux`] call can produce.
#[derive(Debug, Clone, Default)]
pub struct RemuxerResult {
    /// Audio media segment, when one was emitted.
    pub audio: Option<RemuxedTrack>,
    /// Video media segment, when one was emitted.
    pub video: Option<RemuxedTrack>,
    /// Init segment, on first emit or after a reset.
    pub init_segment: Option<InitSegmentData>,
    /// Whether the emitted video starts on a keyframe; set only when
    /// keyframe enforcement ran on a discontinuity.
    pub independent: Option<bool>,
    /// Rebased ID3 metadata cues.
    pub id3: Option<FlushedCues>,
    /// Rebased caption user-data cues.
    pub text: Option<FlushedCues>,
}

/// Non-fatal failures surfaced to the hosting pipeline while the current
/// remux call keeps servicing its remaining tracks.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum MuxError {
    /// The `mdat` buffer for one track could not be allocated. The track's
    /// artifact is omitted from the result; nothing is retried.
    #[error("failed allocating {track_type} mdat of {bytes} bytes: {reason}")]
    Allocation {
        /// Track whose segment was dropped.
        track_type: TrackType,
        /// Requested buffer size.
        bytes: usize,
        /// Allocator failure description.
        reason: String,
    },
}

/// Fire-and-forget sink for remuxer notifications.
///
/// The only outbound channel of the remuxer besides its return value.
/// Implementations must not re-enter the remuxer from the callback.
pub trait RemuxObserver {
    /// Invoked once per non-fatal error.
    fn on_mux_error(&self, error: &MuxError);
}

/// Observer that discards all notifications.
impl RemuxObserver for () {
    fn on_mux_error(&self, _error: &MuxError) {}
}
