//! Transport-stream to fragmented-MP4 remuxing.
//!
//! The remuxer consumes demuxed elementary-stream samples and produces
//! ISO BMFF artifacts for a Media Source Extensions append: one init
//! segment per track configuration plus `moof`+`mdat` media segments.
//!
//! # Architecture
//!
//! [`Mp4Remuxer`] is a single stateful object per media pipeline. Each
//! `remux()` call receives four parallel sample tracks and returns up to
//! five artifacts:
//! - the init segment, once, or again after a track-configuration change
//! - a video media segment with repaired, decode-ordered AVC samples
//! - an audio media segment with silence-filled gaps and re-anchored
//!   overlaps
//! - rebased ID3 metadata cues
//! - rebased caption user-data cues
//!
//! # Time bases
//!
//! All input timestamps live on a 33-bit wrap-around transport clock.
//! The remuxer reconciles three misaligned time bases: clock rollover
//! within a fragment, continuity across fragments that may arrive with
//! holes or overlaps, and audio/video alignment when one track is short
//! or damaged. State between calls is limited to the session anchors
//! (`initPTS`/`initDTS`), the expected join timestamps per track, and the
//! two contiguity flags.

mod audio;
pub mod metadata;
mod quirks;
pub mod remuxer;
pub mod silence;
pub mod timestamp;
pub mod types;
mod video;

pub use metadata::{flush_metadata_cues, flush_userdata_cues};
pub use remuxer::Mp4Remuxer;
pub use silence::silent_frame;
pub use timestamp::normalize_pts;
pub use types::{
    AudioSample, CueSample, DemuxedAudioTrack, DemuxedCueTrack, DemuxedVideoTrack, FlushedCue,
    FlushedCues, InitSegmentData, Mp4Sample, MuxError, NO_PID, PlaylistType, RemuxObserver,
    RemuxedTrack, RemuxerResult, SampleFlags, TrackInitData, TrackMetadata, TrackType,
    VideoSample,
};

/// Samples per AAC access unit.
pub const AAC_SAMPLES_PER_FRAME: u32 = 1024;

/// Samples per MPEG audio (layer II/III) frame.
pub const MPEG_AUDIO_SAMPLES_PER_FRAME: u32 = 1152;

/// Longest audio gap bridged with synthesized silence.
pub const MAX_SILENT_FRAME_DURATION_MS: f64 = 10_000.0;

/// Worst tolerated PTS < DTS excursion, in 90 kHz ticks (0.2 s).
pub const PTS_DTS_SHIFT_TOLERANCE_90KHZ: i64 = 18_000;
