//! Precomputed silent AAC frames for gap filling.
//!
//! Each frame is one raw AAC-LC access unit (no ADTS header) encoding 1024
//! samples of digital silence for a given channel layout. Codecs without a
//! table entry return `None`; the audio remuxer then duplicates the
//! neighboring frame instead of synthesizing silence.

use bytes::Bytes;

const SILENT_AAC_LC_MONO: &[u8] = &[0x00, 0xc8, 0x00, 0x80, 0x23, 0x80];

const SILENT_AAC_LC_STEREO: &[u8] = &[0x21, 0x00, 0x49, 0x90, 0x02, 0x19, 0x00, 0x23, 0x80];

const SILENT_AAC_LC_3CH: &[u8] = &[
    0x00, 0xc8, 0x00, 0x80, 0x20, 0x84, 0x01, 0x26, 0x40, 0x08, 0x64, 0x00, 0x8e,
];

const SILENT_AAC_LC_4CH: &[u8] = &[
    0x00, 0xc8, 0x00, 0x80, 0x20, 0x84, 0x01, 0x26, 0x40, 0x08, 0x64, 0x00, 0x80, 0x2c, 0x80,
    0x08, 0x02, 0x38,
];

const SILENT_AAC_LC_5CH: &[u8] = &[
    0x00, 0xc8, 0x00, 0x80, 0x20, 0x84, 0x01, 0x26, 0x40, 0x08, 0x64, 0x00, 0x82, 0x30, 0x04,
    0x99, 0x00, 0x21, 0x90, 0x02, 0x38,
];

const SILENT_AAC_LC_6CH: &[u8] = &[
    0x00, 0xc8, 0x00, 0x80, 0x20, 0x84, 0x01, 0x26, 0x40, 0x08, 0x64, 0x00, 0x82, 0x30, 0x04,
    0x99, 0x00, 0x21, 0x90, 0x02, 0x00, 0xb2, 0x00, 0x20, 0x08, 0xe0,
];

/// Returns one frame of encoded silence for `codec` and `channel_count`,
/// or `None` when no precomputed frame exists for that layout.
pub fn silent_frame(codec: &str, channel_count: u32) -> Option<Bytes> {
    let frame = match codec {
        "mp4a.40.2" => match channel_count {
            1 => SILENT_AAC_LC_MONO,
            2 => SILENT_AAC_LC_STEREO,
            3 => SILENT_AAC_LC_3CH,
            4 => SILENT_AAC_LC_4CH,
            5 => SILENT_AAC_LC_5CH,
            6 => SILENT_AAC_LC_6CH,
            _ => return None,
        },
        _ => return None,
    };
    Some(Bytes::from_static(frame))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_silent_frame_known_layouts() {
        for channels in 1..=6 {
            let frame = silent_frame("mp4a.40.2", channels).unwrap();
            assert!(!frame.is_empty());
        }
    }

    #[test]
    fn test_silent_frame_frame_grows_with_channels() {
        let mono = silent_frame("mp4a.40.2", 1).unwrap();
        let six = silent_frame("mp4a.40.2", 6).unwrap();
        assert!(six.len() > mono.len());
    }

    #[test]
    fn test_silent_frame_unknown_codec() {
        assert!(silent_frame("mp4a.40.5", 2).is_none());
        assert!(silent_frame("mp3", 2).is_none());
    }

    #[test]
    fn test_silent_frame_unknown_layout() {
        assert!(silent_frame("mp4a.40.2", 0).is_none());
        assert!(silent_frame("mp4a.40.2", 8).is_none());
    }
}
