//! Serialization of the ISO BMFF boxes emitted by the remuxer.
//!
//! Init segments follow the single-track `ftyp` + `moov` (+ `mvex`) layout;
//! media-segment metadata is an `mfhd` + one `traf` with `tfhd`, `tfdt` and
//! a version-0 `trun` enumerating per-sample duration, size, flags and
//! composition offset. All multi-byte integers are big-endian.

use crate::remux::types::{DemuxedAudioTrack, DemuxedVideoTrack, Mp4Sample};

/// Track id used for the video `trak`/`traf`.
pub const VIDEO_TRACK_ID: u32 = 1;

/// Track id used for the audio `trak`/`traf`.
pub const AUDIO_TRACK_ID: u32 = 2;

/// trun flags: data-offset, sample-duration, sample-size, sample-flags and
/// sample-composition-time-offset present.
const TRUN_FLAGS: u32 = 0x000f01;

fn make_box(fourcc: &[u8; 4], payload: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(8 + payload.len());
    out.extend_from_slice(&((8 + payload.len()) as u32).to_be_bytes());
    out.extend_from_slice(fourcc);
    out.extend_from_slice(payload);
    out
}

fn full_box(fourcc: &[u8; 4], version: u8, flags: u32, payload: &[u8]) -> Vec<u8> {
    let mut body = Vec::with_capacity(4 + payload.len());
    body.push(version);
    body.extend_from_slice(&flags.to_be_bytes()[1..]);
    body.extend_from_slice(payload);
    make_box(fourcc, &body)
}

fn concat(parts: &[Vec<u8>]) -> Vec<u8> {
    let mut out = Vec::with_capacity(parts.iter().map(Vec::len).sum());
    for part in parts {
        out.extend_from_slice(part);
    }
    out
}

// === init segments ===

/// Builds the `ftyp` + `moov` init segment for an AVC video track.
pub fn video_init_segment(track: &DemuxedVideoTrack) -> Vec<u8> {
    let trak = video_trak(track);
    init_segment(track.timescale, VIDEO_TRACK_ID, trak)
}

/// Builds the `ftyp` + `moov` init segment for an audio track.
pub fn audio_init_segment(track: &DemuxedAudioTrack) -> Vec<u8> {
    let trak = audio_trak(track);
    init_segment(track.timescale, AUDIO_TRACK_ID, trak)
}

fn init_segment(timescale: u32, track_id: u32, trak: Vec<u8>) -> Vec<u8> {
    let ftyp = build_ftyp();
    let moov = make_box(
        b"moov",
        &concat(&[build_mvhd(timescale, track_id + 1), trak, build_mvex(track_id)]),
    );
    concat(&[ftyp, moov])
}

fn build_ftyp() -> Vec<u8> {
    let mut payload = Vec::with_capacity(16);
    payload.extend_from_slice(b"isom");
    payload.extend_from_slice(&1u32.to_be_bytes());
    payload.extend_from_slice(b"isom");
    payload.extend_from_slice(b"avc1");
    make_box(b"ftyp", &payload)
}

fn build_mvhd(timescale: u32, next_track_id: u32) -> Vec<u8> {
    let mut payload = Vec::with_capacity(96);
    payload.extend_from_slice(&0u32.to_be_bytes()); // creation_time
    payload.extend_from_slice(&0u32.to_be_bytes()); // modification_time
    payload.extend_from_slice(&timescale.to_be_bytes());
    payload.extend_from_slice(&0u32.to_be_bytes()); // duration: fragmented
    payload.extend_from_slice(&0x0001_0000u32.to_be_bytes()); // rate 1.0
    payload.extend_from_slice(&0x0100u16.to_be_bytes()); // volume 1.0
    payload.extend_from_slice(&[0u8; 2]); // reserved
    payload.extend_from_slice(&[0u8; 8]); // reserved
    payload.extend_from_slice(&unity_matrix());
    payload.extend_from_slice(&[0u8; 24]); // pre_defined
    payload.extend_from_slice(&next_track_id.to_be_bytes());
    full_box(b"mvhd", 0, 0, &payload)
}

fn build_mvex(track_id: u32) -> Vec<u8> {
    let mut payload = Vec::with_capacity(20);
    payload.extend_from_slice(&track_id.to_be_bytes());
    payload.extend_from_slice(&1u32.to_be_bytes()); // default_sample_description_index
    payload.extend_from_slice(&0u32.to_be_bytes()); // default_sample_duration
    payload.extend_from_slice(&0u32.to_be_bytes()); // default_sample_size
    payload.extend_from_slice(&0x0001_0001u32.to_be_bytes()); // default_sample_flags
    let trex = full_box(b"trex", 0, 0, &payload);
    make_box(b"mvex", &trex)
}

fn unity_matrix() -> [u8; 36] {
    let mut matrix = [0u8; 36];
    matrix[0..4].copy_from_slice(&0x0001_0000u32.to_be_bytes());
    matrix[16..20].copy_from_slice(&0x0001_0000u32.to_be_bytes());
    matrix[32..36].copy_from_slice(&0x4000_0000u32.to_be_bytes());
    matrix
}

fn build_tkhd(track_id: u32, width: u32, height: u32) -> Vec<u8> {
    let mut payload = Vec::with_capacity(80);
    payload.extend_from_slice(&0u32.to_be_bytes()); // creation_time
    payload.extend_from_slice(&0u32.to_be_bytes()); // modification_time
    payload.extend_from_slice(&track_id.to_be_bytes());
    payload.extend_from_slice(&[0u8; 4]); // reserved
    payload.extend_from_slice(&0u32.to_be_bytes()); // duration: fragmented
    payload.extend_from_slice(&[0u8; 8]); // reserved
    payload.extend_from_slice(&[0u8; 2]); // layer
    payload.extend_from_slice(&[0u8; 2]); // alternate_group
    payload.extend_from_slice(&[0u8; 2]); // volume
    payload.extend_from_slice(&[0u8; 2]); // reserved
    payload.extend_from_slice(&unity_matrix());
    payload.extend_from_slice(&(width << 16).to_be_bytes());
    payload.extend_from_slice(&(height << 16).to_be_bytes());
    // flags: track enabled, in movie
    full_box(b"tkhd", 0, 0x000003, &payload)
}

fn build_mdhd(timescale: u32) -> Vec<u8> {
    let mut payload = Vec::with_capacity(20);
    payload.extend_from_slice(&0u32.to_be_bytes()); // creation_time
    payload.extend_from_slice(&0u32.to_be_bytes()); // modification_time
    payload.extend_from_slice(&timescale.to_be_bytes());
    payload.extend_from_slice(&0u32.to_be_bytes()); // duration: fragmented
    payload.extend_from_slice(&0x55c4u16.to_be_bytes()); // language: und
    payload.extend_from_slice(&[0u8; 2]); // pre_defined
    full_box(b"mdhd", 0, 0, &payload)
}

fn build_hdlr(handler_type: &[u8; 4], name: &[u8]) -> Vec<u8> {
    let mut payload = Vec::with_capacity(20 + name.len());
    payload.extend_from_slice(&[0u8; 4]); // pre_defined
    payload.extend_from_slice(handler_type);
    payload.extend_from_slice(&[0u8; 12]); // reserved
    payload.extend_from_slice(name);
    full_box(b"hdlr", 0, 0, &payload)
}

fn build_dinf() -> Vec<u8> {
    let url = full_box(b"url ", 0, 0x000001, &[]); // self-contained
    let mut dref_payload = Vec::with_capacity(4 + url.len());
    dref_payload.extend_from_slice(&1u32.to_be_bytes());
    dref_payload.extend_from_slice(&url);
    let dref = full_box(b"dref", 0, 0, &dref_payload);
    make_box(b"dinf", &dref)
}

fn empty_sample_tables(stsd: Vec<u8>) -> Vec<u8> {
    let stts = full_box(b"stts", 0, 0, &0u32.to_be_bytes());
    let stsc = full_box(b"stsc", 0, 0, &0u32.to_be_bytes());
    let stsz = full_box(b"stsz", 0, 0, &[0u8; 8]);
    let stco = full_box(b"stco", 0, 0, &0u32.to_be_bytes());
    make_box(b"stbl", &concat(&[stsd, stts, stsc, stsz, stco]))
}

fn video_trak(track: &DemuxedVideoTrack) -> Vec<u8> {
    let stsd = {
        let mut payload = Vec::new();
        payload.extend_from_slice(&1u32.to_be_bytes());
        payload.extend_from_slice(&build_avc1(track));
        full_box(b"stsd", 0, 0, &payload)
    };
    let minf = make_box(
        b"minf",
        &concat(&[
            full_box(b"vmhd", 0, 0x000001, &[0u8; 8]),
            build_dinf(),
            empty_sample_tables(stsd),
        ]),
    );
    let mdia = make_box(
        b"mdia",
        &concat(&[
            build_mdhd(track.timescale),
            build_hdlr(b"vide", b"VideoHandler\0"),
            minf,
        ]),
    );
    make_box(
        b"trak",
        &concat(&[build_tkhd(VIDEO_TRACK_ID, track.width, track.height), mdia]),
    )
}

fn build_avc1(track: &DemuxedVideoTrack) -> Vec<u8> {
    let mut payload = Vec::new();
    payload.extend_from_slice(&[0u8; 6]); // reserved
    payload.extend_from_slice(&1u16.to_be_bytes()); // data_reference_index
    payload.extend_from_slice(&[0u8; 2]); // pre_defined
    payload.extend_from_slice(&[0u8; 2]); // reserved
    payload.extend_from_slice(&[0u8; 12]); // pre_defined
    payload.extend_from_slice(&(track.width as u16).to_be_bytes());
    payload.extend_from_slice(&(track.height as u16).to_be_bytes());
    payload.extend_from_slice(&0x0048_0000u32.to_be_bytes()); // 72 dpi
    payload.extend_from_slice(&0x0048_0000u32.to_be_bytes());
    payload.extend_from_slice(&[0u8; 4]); // reserved
    payload.extend_from_slice(&1u16.to_be_bytes()); // frame_count
    payload.extend_from_slice(&[0u8; 32]); // compressorname
    payload.extend_from_slice(&0x0018u16.to_be_bytes()); // depth: color, no alpha
    payload.extend_from_slice(&0xffffu16.to_be_bytes()); // pre_defined
    payload.extend_from_slice(&build_avcc(track));
    make_box(b"avc1", &payload)
}

fn build_avcc(track: &DemuxedVideoTrack) -> Vec<u8> {
    let first_sps = track.sps.first().map(|s| s.as_ref()).unwrap_or(&[]);
    let byte_at = |i: usize| first_sps.get(i).copied().unwrap_or(0);

    let mut payload = Vec::new();
    payload.push(1); // configurationVersion
    payload.push(byte_at(1)); // AVCProfileIndication
    payload.push(byte_at(2)); // profile_compatibility
    payload.push(byte_at(3)); // AVCLevelIndication
    payload.push(0xff); // lengthSizeMinusOne = 3
    payload.push(0xe0 | (track.sps.len() as u8 & 0x1f));
    for sps in &track.sps {
        payload.extend_from_slice(&(sps.len() as u16).to_be_bytes());
        payload.extend_from_slice(sps);
    }
    payload.push(track.pps.len() as u8);
    for pps in &track.pps {
        payload.extend_from_slice(&(pps.len() as u16).to_be_bytes());
        payload.extend_from_slice(pps);
    }
    make_box(b"avcC", &payload)
}

fn audio_trak(track: &DemuxedAudioTrack) -> Vec<u8> {
    let entry = if track.is_aac {
        build_audio_sample_entry(b"mp4a", track, true)
    } else {
        build_audio_sample_entry(b".mp3", track, false)
    };
    let stsd = {
        let mut payload = Vec::new();
        payload.extend_from_slice(&1u32.to_be_bytes());
        payload.extend_from_slice(&entry);
        full_box(b"stsd", 0, 0, &payload)
    };
    let minf = make_box(
        b"minf",
        &concat(&[
            full_box(b"smhd", 0, 0, &[0u8; 4]),
            build_dinf(),
            empty_sample_tables(stsd),
        ]),
    );
    let mdia = make_box(
        b"mdia",
        &concat(&[
            build_mdhd(track.timescale),
            build_hdlr(b"soun", b"SoundHandler\0"),
            minf,
        ]),
    );
    make_box(
        b"trak",
        &concat(&[build_tkhd(AUDIO_TRACK_ID, 0, 0), mdia]),
    )
}

fn build_audio_sample_entry(
    fourcc: &[u8; 4],
    track: &DemuxedAudioTrack,
    with_esds: bool,
) -> Vec<u8> {
    let mut payload = Vec::new();
    payload.extend_from_slice(&[0u8; 6]); // reserved
    payload.extend_from_slice(&1u16.to_be_bytes()); // data_reference_index
    payload.extend_from_slice(&[0u8; 8]); // reserved
    payload.extend_from_slice(&(track.channel_count as u16).to_be_bytes());
    payload.extend_from_slice(&16u16.to_be_bytes()); // samplesize
    payload.extend_from_slice(&[0u8; 2]); // pre_defined
    payload.extend_from_slice(&[0u8; 2]); // reserved
    payload.extend_from_slice(&(track.samplerate << 16).to_be_bytes());
    if with_esds {
        payload.extend_from_slice(&build_esds(track));
    }
    make_box(fourcc, &payload)
}

fn build_esds(track: &DemuxedAudioTrack) -> Vec<u8> {
    let config = track.config.as_deref().unwrap_or(&[]);
    let config_len = config.len() as u8;

    let mut payload = Vec::with_capacity(25 + config.len());
    // ES_Descriptor: ES_ID 1, no flags
    payload.extend_from_slice(&[0x03, 0x17 + config_len, 0x00, 0x01, 0x00]);
    // DecoderConfigDescriptor: AAC (0x40), AudioStream, 56 kbps hints
    payload.extend_from_slice(&[
        0x04,
        0x0f + config_len,
        0x40,
        0x15,
        0x00,
        0x06,
        0x00,
        0x00,
        0x00,
        0xda,
        0xc0,
        0x00,
        0x00,
        0xda,
        0xc0,
    ]);
    // DecoderSpecificInfo
    payload.push(0x05);
    payload.push(config_len);
    payload.extend_from_slice(config);
    // SLConfigDescriptor
    payload.extend_from_slice(&[0x06, 0x01, 0x02]);
    full_box(b"esds", 0, 0, &payload)
}

// === media segments ===

/// Builds the `moof` box for one fragment of one track.
///
/// `base_media_decode_time` is the DTS of the first sample in the track
/// timescale. The `trun` data offset assumes the `mdat` box immediately
/// follows the returned bytes.
pub fn moof(
    sequence_number: u32,
    base_media_decode_time: i64,
    track_id: u32,
    samples: &[Mp4Sample],
) -> Vec<u8> {
    let mfhd = full_box(b"mfhd", 0, 0, &sequence_number.to_be_bytes());

    let tfhd = full_box(b"tfhd", 0, 0, &track_id.to_be_bytes());
    let tfdt = full_box(
        b"tfdt",
        1,
        0,
        &(base_media_decode_time as u64).to_be_bytes(),
    );

    // Fixed layout: moof = 88 + 16 bytes per sample, mdat header follows.
    let data_offset = (88 + 16 * samples.len() + 8) as u32;
    let mut trun_payload = Vec::with_capacity(8 + 16 * samples.len());
    trun_payload.extend_from_slice(&(samples.len() as u32).to_be_bytes());
    trun_payload.extend_from_slice(&data_offset.to_be_bytes());
    for sample in samples {
        trun_payload.extend_from_slice(&sample.duration.to_be_bytes());
        trun_payload.extend_from_slice(&sample.size.to_be_bytes());
        let flags = &sample.flags;
        trun_payload.push((flags.is_leading << 2) | flags.depends_on);
        trun_payload.push(
            (flags.is_depended_on << 6)
                | (flags.has_redundancy << 4)
                | (flags.padding_value << 1)
                | flags.is_non_sync,
        );
        trun_payload.extend_from_slice(&flags.degrad_prio.to_be_bytes());
        trun_payload.extend_from_slice(&(sample.cts as u32).to_be_bytes());
    }
    let trun = full_box(b"trun", 0, TRUN_FLAGS, &trun_payload);

    let traf = make_box(b"traf", &concat(&[tfhd, tfdt, trun]));
    make_box(b"moof", &concat(&[mfhd, traf]))
}
