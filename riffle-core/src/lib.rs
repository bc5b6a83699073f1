//! Riffle Core - transport-stream to fragmented-MP4 remuxing

#![deny(missing_docs)]
#![deny(clippy::missing_errors_doc)]
#![deny(clippy::missing_panics_doc)]
#![warn(clippy::too_many_lines)]
//!
//! This crate provides the remuxing core of an HLS playback pipeline: it
//! consumes demuxed elementary-stream samples (H.264/AVC access units,
//! AAC/MPEG audio frames, timed ID3 metadata and caption cues) and emits
//! ISO BMFF initialization and media segments suitable for a Media Source
//! Extensions byte-stream append.

pub mod config;
pub mod mp4;
pub mod remux;
pub mod tracing_setup;

// Re-export main types for convenient access
pub use config::{RemuxConfig, TypeSupported};
pub use remux::{
    Mp4Remuxer, MuxError, PlaylistType, RemuxObserver, RemuxedTrack, RemuxerResult,
    flush_metadata_cues, flush_userdata_cues, normalize_pts, silent_frame,
};
pub use tracing_setup::init_tracing;
