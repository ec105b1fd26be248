//! Synthetic MP4 fixtures built box by box.
#![allow(dead_code)]

use byteorder::{BigEndian, WriteBytesExt};

pub const MOVIE_TIMESCALE: u32 = 1000;
pub const VIDEO_TIMESCALE: u32 = 12800;
pub const AUDIO_TIMESCALE: u32 = 48000;

pub fn bx(typ: &[u8; 4], payload: &[u8]) -> Vec<u8> {
    let mut v = Vec::new();
    v.write_u32::<BigEndian>(8 + payload.len() as u32).unwrap();
    v.extend_from_slice(typ);
    v.extend_from_slice(payload);
    v
}

pub fn full(typ: &[u8; 4], version: u8, flags: u32, payload: &[u8]) -> Vec<u8> {
    let mut p = Vec::new();
    p.write_u8(version).unwrap();
    p.write_u24::<BigEndian>(flags).unwrap();
    p.extend_from_slice(payload);
    bx(typ, &p)
}

/// Same box, written with a 64-bit size field.
pub fn large(typ: &[u8; 4], payload: &[u8]) -> Vec<u8> {
    let mut v = Vec::new();
    v.write_u32::<BigEndian>(1).unwrap();
    v.extend_from_slice(typ);
    v.write_u64::<BigEndian>(16 + payload.len() as u64).unwrap();
    v.extend_from_slice(payload);
    v
}

pub fn cat(parts: &[Vec<u8>]) -> Vec<u8> {
    parts.concat()
}

pub fn ftyp() -> Vec<u8> {
    let mut p = Vec::new();
    p.extend_from_slice(b"isom");
    p.write_u32::<BigEndian>(512).unwrap();
    p.extend_from_slice(b"isom");
    p.extend_from_slice(b"avc1");
    bx(b"ftyp", &p)
}

pub fn mvhd(timescale: u32, duration: u32) -> Vec<u8> {
    let mut p = Vec::new();
    p.write_u32::<BigEndian>(0).unwrap(); // creation
    p.write_u32::<BigEndian>(0).unwrap(); // modification
    p.write_u32::<BigEndian>(timescale).unwrap();
    p.write_u32::<BigEndian>(duration).unwrap();
    p.extend_from_slice(&[0u8; 80]);
    full(b"mvhd", 0, 0, &p)
}

pub const IDENTITY: [i32; 9] = [0x10000, 0, 0, 0, 0x10000, 0, 0, 0, 0x4000_0000];
pub const ROTATE_90: [i32; 9] = [0, 0x10000, 0, -0x10000, 0, 0, 0, 0, 0x4000_0000];

pub fn tkhd(track_id: u32, width: u32, height: u32, matrix: [i32; 9]) -> Vec<u8> {
    let mut p = Vec::new();
    p.write_u32::<BigEndian>(0).unwrap();
    p.write_u32::<BigEndian>(0).unwrap();
    p.write_u32::<BigEndian>(track_id).unwrap();
    p.write_u32::<BigEndian>(0).unwrap(); // reserved
    p.write_u32::<BigEndian>(0).unwrap(); // duration
    p.extend_from_slice(&[0u8; 16]);
    for m in matrix {
        p.write_i32::<BigEndian>(m).unwrap();
    }
    p.write_u32::<BigEndian>(width << 16).unwrap();
    p.write_u32::<BigEndian>(height << 16).unwrap();
    full(b"tkhd", 0, 3, &p)
}

pub fn tkhd_v1(track_id: u32) -> Vec<u8> {
    let mut p = Vec::new();
    p.write_u64::<BigEndian>(0).unwrap();
    p.write_u64::<BigEndian>(0).unwrap();
    p.write_u32::<BigEndian>(track_id).unwrap();
    p.write_u32::<BigEndian>(0).unwrap();
    p.write_u64::<BigEndian>(0).unwrap();
    p.extend_from_slice(&[0u8; 16]);
    for m in IDENTITY {
        p.write_i32::<BigEndian>(m).unwrap();
    }
    p.write_u32::<BigEndian>(0).unwrap();
    p.write_u32::<BigEndian>(0).unwrap();
    full(b"tkhd", 1, 3, &p)
}

pub fn mdhd(timescale: u32, duration: u32) -> Vec<u8> {
    let mut p = Vec::new();
    p.write_u32::<BigEndian>(0).unwrap();
    p.write_u32::<BigEndian>(0).unwrap();
    p.write_u32::<BigEndian>(timescale).unwrap();
    p.write_u32::<BigEndian>(duration).unwrap();
    p.write_u16::<BigEndian>(0x15C7).unwrap(); // "eng"
    p.write_u16::<BigEndian>(0).unwrap();
    full(b"mdhd", 0, 0, &p)
}

pub fn hdlr(handler: &[u8; 4]) -> Vec<u8> {
    let mut p = Vec::new();
    p.write_u32::<BigEndian>(0).unwrap();
    p.extend_from_slice(handler);
    p.extend_from_slice(&[0u8; 12]);
    p.extend_from_slice(b"Handler\0");
    full(b"hdlr", 0, 0, &p)
}

/// Edit list of `(segment_duration, media_time)` pairs, version 0.
pub fn elst(edits: &[(u32, i32)]) -> Vec<u8> {
    let mut p = Vec::new();
    p.write_u32::<BigEndian>(edits.len() as u32).unwrap();
    for &(segment_duration, media_time) in edits {
        p.write_u32::<BigEndian>(segment_duration).unwrap();
        p.write_i32::<BigEndian>(media_time).unwrap();
        p.write_i16::<BigEndian>(1).unwrap();
        p.write_i16::<BigEndian>(0).unwrap();
    }
    bx(b"edts", &full(b"elst", 0, 0, &p))
}

pub fn avc1(width: u16, height: u16) -> Vec<u8> {
    let mut p = Vec::new();
    p.extend_from_slice(&[0u8; 6]);
    p.write_u16::<BigEndian>(1).unwrap(); // data_reference_index
    p.extend_from_slice(&[0u8; 16]);
    p.write_u16::<BigEndian>(width).unwrap();
    p.write_u16::<BigEndian>(height).unwrap();
    p.extend_from_slice(&[0u8; 50]);
    p.extend_from_slice(&bx(b"avcC", &[1, 0x64, 0, 0x1F, 0xFF, 0xE0, 0]));
    bx(b"avc1", &p)
}

/// esds for AAC-LC, 48 kHz, one channel.
pub fn esds_aac_mono() -> Vec<u8> {
    let asc = [0x11u8, 0x88];
    let mut dc = vec![0x40, 0x15, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0];
    dc.push(0x05);
    dc.push(asc.len() as u8);
    dc.extend_from_slice(&asc);

    let mut es = vec![0, 2, 0];
    es.push(0x04);
    es.push(dc.len() as u8);
    es.extend_from_slice(&dc);
    es.extend_from_slice(&[0x06, 1, 2]);

    let mut p = vec![0x03, es.len() as u8];
    p.extend_from_slice(&es);
    full(b"esds", 0, 0, &p)
}

pub fn audio_entry(typ: &[u8; 4], channels: u16, sample_size: u16, rate: u32, children: &[u8]) -> Vec<u8> {
    let mut p = Vec::new();
    p.extend_from_slice(&[0u8; 6]);
    p.write_u16::<BigEndian>(1).unwrap();
    p.write_u16::<BigEndian>(0).unwrap(); // version
    p.extend_from_slice(&[0u8; 6]);
    p.write_u16::<BigEndian>(channels).unwrap();
    p.write_u16::<BigEndian>(sample_size).unwrap();
    p.extend_from_slice(&[0u8; 4]);
    p.write_u32::<BigEndian>(rate << 16).unwrap();
    p.extend_from_slice(children);
    bx(typ, &p)
}

pub fn stsd(entry: &[u8]) -> Vec<u8> {
    let mut p = Vec::new();
    p.write_u32::<BigEndian>(1).unwrap();
    p.extend_from_slice(entry);
    full(b"stsd", 0, 0, &p)
}

/// Sample tables describing `samples` samples in one chunk.
pub fn sample_tables(samples: u32, delta: u32) -> Vec<u8> {
    if samples == 0 {
        return empty_sample_tables();
    }
    let mut stts = Vec::new();
    stts.write_u32::<BigEndian>(1).unwrap();
    stts.write_u32::<BigEndian>(samples).unwrap();
    stts.write_u32::<BigEndian>(delta).unwrap();

    let mut stsc = Vec::new();
    stsc.write_u32::<BigEndian>(1).unwrap();
    stsc.write_u32::<BigEndian>(1).unwrap();
    stsc.write_u32::<BigEndian>(samples).unwrap();
    stsc.write_u32::<BigEndian>(1).unwrap();

    let mut stsz = Vec::new();
    stsz.write_u32::<BigEndian>(100).unwrap();
    stsz.write_u32::<BigEndian>(samples).unwrap();

    let mut stco = Vec::new();
    stco.write_u32::<BigEndian>(1).unwrap();
    stco.write_u32::<BigEndian>(48).unwrap();

    cat(&[
        full(b"stts", 0, 0, &stts),
        full(b"stsc", 0, 0, &stsc),
        full(b"stsz", 0, 0, &stsz),
        full(b"stco", 0, 0, &stco),
    ])
}

pub fn empty_sample_tables() -> Vec<u8> {
    let zero = 0u32.to_be_bytes();
    let mut stsz = Vec::new();
    stsz.write_u32::<BigEndian>(0).unwrap();
    stsz.write_u32::<BigEndian>(0).unwrap();
    cat(&[
        full(b"stts", 0, 0, &zero),
        full(b"stsc", 0, 0, &zero),
        full(b"stsz", 0, 0, &stsz),
        full(b"stco", 0, 0, &zero),
    ])
}

pub struct TrackSpec {
    pub tkhd: Vec<u8>,
    pub edts: Option<Vec<u8>>,
    pub mdhd: Vec<u8>,
    pub handler: [u8; 4],
    pub entry: Vec<u8>,
    pub tables: Vec<u8>,
}

pub fn trak(t: &TrackSpec) -> Vec<u8> {
    let stbl = bx(b"stbl", &cat(&[stsd(&t.entry), t.tables.clone()]));
    let minf = bx(b"minf", &cat(&[full(b"vmhd", 0, 1, &[0u8; 8]), stbl]));
    let mdia = bx(b"mdia", &cat(&[t.mdhd.clone(), hdlr(&t.handler), minf]));
    let mut parts = vec![t.tkhd.clone()];
    if let Some(edts) = &t.edts {
        parts.push(edts.clone());
    }
    parts.push(mdia);
    bx(b"trak", &cat(&parts))
}

pub fn video_track() -> TrackSpec {
    TrackSpec {
        tkhd: tkhd(1, 320, 240, IDENTITY),
        edts: Some(elst(&[(40, 0)])),
        mdhd: mdhd(VIDEO_TIMESCALE, 512),
        handler: *b"vide",
        entry: avc1(320, 240),
        tables: sample_tables(1, 512),
    }
}

pub fn audio_track() -> TrackSpec {
    TrackSpec {
        tkhd: tkhd(2, 0, 0, IDENTITY),
        edts: Some(elst(&[(40, 1024)])),
        mdhd: mdhd(AUDIO_TIMESCALE, 2944),
        handler: *b"soun",
        entry: audio_entry(b"mp4a", 2, 16, 48000, &esds_aac_mono()),
        tables: sample_tables(2, 1024),
    }
}

/// Same as [`trak`], with `hdlr` placed after `minf`.
pub fn trak_handler_last(t: &TrackSpec) -> Vec<u8> {
    let stbl = bx(b"stbl", &cat(&[stsd(&t.entry), t.tables.clone()]));
    let minf = bx(b"minf", &cat(&[full(b"smhd", 0, 0, &[0u8; 4]), stbl]));
    let mdia = bx(b"mdia", &cat(&[t.mdhd.clone(), minf, hdlr(&t.handler)]));
    bx(b"trak", &cat(&[t.tkhd.clone(), mdia]))
}

pub const KEY_ID: [u8; 16] = [0x7E; 16];
pub const WIDEVINE: [u8; 16] = [
    0xED, 0xEF, 0x8B, 0xA9, 0x79, 0xD6, 0x4A, 0xCE, 0xA3, 0xC8, 0x27, 0xDC, 0xD5, 0x1D, 0x21, 0xED,
];

/// `sinf` for a cenc-protected entry whose real format is `original`.
pub fn sinf(original: &[u8; 4]) -> Vec<u8> {
    let mut schm = Vec::new();
    schm.extend_from_slice(b"cenc");
    schm.write_u32::<BigEndian>(0x10000).unwrap();

    let mut tenc = vec![0u8, 0, 1, 8];
    tenc.extend_from_slice(&KEY_ID);

    bx(
        b"sinf",
        &cat(&[
            bx(b"frma", original),
            full(b"schm", 0, 0, &schm),
            bx(b"schi", &full(b"tenc", 0, 0, &tenc)),
        ]),
    )
}

/// `encv` wrapping the [`avc1`] entry, avcC included.
pub fn encv(width: u16, height: u16) -> Vec<u8> {
    let mut entry = avc1(width, height);
    entry.extend_from_slice(&sinf(b"avc1"));
    let size = entry.len() as u32;
    entry[..4].copy_from_slice(&size.to_be_bytes());
    entry[4..8].copy_from_slice(b"encv");
    entry
}

/// dOps: stereo, 312 samples pre-skip, 48 kHz, mapping family 0.
pub fn dops() -> Vec<u8> {
    bx(b"dOps", &[0, 2, 0x01, 0x38, 0, 0, 0xBB, 0x80, 0, 0, 0])
}

/// dfLa with a single 34-byte STREAMINFO block.
pub fn dfla() -> Vec<u8> {
    let mut p = vec![0x80, 0, 0, 34];
    p.extend((0..34u8).map(|i| i + 1));
    full(b"dfLa", 0, 0, &p)
}

/// Version 0 `pssh` with no key ids.
pub fn pssh(system_id: &[u8; 16], data: &[u8]) -> Vec<u8> {
    let mut p = Vec::new();
    p.extend_from_slice(system_id);
    p.write_u32::<BigEndian>(data.len() as u32).unwrap();
    p.extend_from_slice(data);
    full(b"pssh", 0, 0, &p)
}

pub fn moov(tracks: &[TrackSpec], extra: &[Vec<u8>]) -> Vec<u8> {
    let mut parts = vec![mvhd(MOVIE_TIMESCALE, 62)];
    parts.extend(tracks.iter().map(trak));
    parts.extend(extra.iter().cloned());
    bx(b"moov", &cat(&parts))
}

pub fn mdat() -> Vec<u8> {
    bx(b"mdat", &[0xAA; 64])
}

/// ftyp, a two-track moov (video then audio) and an mdat.
pub fn minimal_av() -> Vec<u8> {
    cat(&[ftyp(), moov(&[video_track(), audio_track()], &[]), mdat()])
}

pub fn mvex(fragment_duration: u32) -> Vec<u8> {
    let mut trex = Vec::new();
    trex.write_u32::<BigEndian>(1).unwrap(); // track_ID
    trex.extend_from_slice(&[0u8; 16]);
    bx(
        b"mvex",
        &cat(&[
            full(b"mehd", 0, 0, &fragment_duration.to_be_bytes()),
            full(b"trex", 0, 0, &trex),
        ]),
    )
}

/// Initialization segment of a fragmented file followed by one fragment.
pub fn fragmented() -> Vec<u8> {
    let mut video = video_track();
    video.tables = empty_sample_tables();
    video.edts = None;
    let moof = bx(
        b"moof",
        &cat(&[
            full(b"mfhd", 0, 0, &1u32.to_be_bytes()),
            bx(b"traf", &full(b"tfhd", 0, 0x20000, &1u32.to_be_bytes())),
        ]),
    );
    cat(&[ftyp(), moov(&[video], &[mvex(10032)]), moof, mdat()])
}
