//! ISO BMFF box writing for init and media segments.
//!
//! The generator is a pure byte producer: given track configuration it
//! serializes `ftyp` + `moov` init segments, and given a sample run it
//! serializes the `moof` metadata of a media segment. `mdat` payloads are
//! assembled by the remuxers, which know the bitstream layout of each
//! codec.

pub mod generator;

pub use generator::{
    AUDIO_TRACK_ID, VIDEO_TRACK_ID, audio_init_segment, moof, video_init_segment,
};
