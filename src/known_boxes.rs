use crate::boxes::FourCC;

/// Typed view over the MP4 / ISOBMFF boxes this crate understands.
///
/// Anything not in this list becomes `KnownBox::Unknown(fourcc)` and is
/// skipped without looking at its payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KnownBox {
    // File-level / top-level
    Ftyp,
    Moov,
    Mdat,
    Free,
    Skip,
    Wide,
    Meta,
    Mfra,

    // moov children
    Mvhd,
    Trak,
    Mvex,
    Udta,

    // trak children
    Tkhd,
    Edts,
    Mdia,

    // edts children
    Elst,

    // mdia children
    Mdhd,
    Hdlr,
    Minf,

    // minf children
    Vmhd,
    Smhd,
    Dinf,
    Stbl,

    // dinf children
    Dref,

    // stbl children
    Stsd,
    Stts,
    Ctts,
    Stsc,
    Stsz,
    Stz2,
    Stco,
    Co64,
    Stss,

    // fragmented / mvex / moof / traf
    Mehd,
    Trex,
    Moof,
    Traf,

    // Codec configuration
    Esds,
    Avcc,
    Hvcc,
    Vpcc,
    Av1c,
    Dops,
    Dfla,
    Wave,

    // Encryption / CENC
    Sinf,
    Frma,
    Schm,
    Schi,
    Tenc,
    Pssh,

    // Sample entries (video)
    Avc1,
    Avc3,
    Hev1,
    Hvc1,
    Mp4v,
    Vp08,
    Vp09,
    Av01,
    Encv,

    // Sample entries (audio)
    Mp4a,
    Ac3,
    Ec3,
    Opus,
    Flac,
    Alac,
    Mp3,
    Lpcm,
    Sowt,
    Twos,
    Enca,

    // Raw UUID/vendor
    Uuid,

    // Anything else
    Unknown(FourCC),
}

impl From<FourCC> for KnownBox {
    fn from(cc: FourCC) -> Self {
        match &cc.0 {
            b"ftyp" => KnownBox::Ftyp,
            b"moov" => KnownBox::Moov,
            b"mdat" => KnownBox::Mdat,
            b"free" => KnownBox::Free,
            b"skip" => KnownBox::Skip,
            b"wide" => KnownBox::Wide,
            b"meta" => KnownBox::Meta,
            b"mfra" => KnownBox::Mfra,

            b"mvhd" => KnownBox::Mvhd,
            b"trak" => KnownBox::Trak,
            b"mvex" => KnownBox::Mvex,
            b"udta" => KnownBox::Udta,

            b"tkhd" => KnownBox::Tkhd,
            b"edts" => KnownBox::Edts,
            b"mdia" => KnownBox::Mdia,

            b"elst" => KnownBox::Elst,

            b"mdhd" => KnownBox::Mdhd,
            b"hdlr" => KnownBox::Hdlr,
            b"minf" => KnownBox::Minf,

            b"vmhd" => KnownBox::Vmhd,
            b"smhd" => KnownBox::Smhd,
            b"dinf" => KnownBox::Dinf,
            b"stbl" => KnownBox::Stbl,

            b"dref" => KnownBox::Dref,

            b"stsd" => KnownBox::Stsd,
            b"stts" => KnownBox::Stts,
            b"ctts" => KnownBox::Ctts,
            b"stsc" => KnownBox::Stsc,
            b"stsz" => KnownBox::Stsz,
            b"stz2" => KnownBox::Stz2,
            b"stco" => KnownBox::Stco,
            b"co64" => KnownBox::Co64,
            b"stss" => KnownBox::Stss,

            b"mehd" => KnownBox::Mehd,
            b"trex" => KnownBox::Trex,
            b"moof" => KnownBox::Moof,
            b"traf" => KnownBox::Traf,

            b"esds" => KnownBox::Esds,
            b"avcC" => KnownBox::Avcc,
            b"hvcC" => KnownBox::Hvcc,
            b"vpcC" => KnownBox::Vpcc,
            b"av1C" => KnownBox::Av1c,
            b"dOps" => KnownBox::Dops,
            b"dfLa" => KnownBox::Dfla,
            b"wave" => KnownBox::Wave,

            b"sinf" => KnownBox::Sinf,
            b"frma" => KnownBox::Frma,
            b"schm" => KnownBox::Schm,
            b"schi" => KnownBox::Schi,
            b"tenc" => KnownBox::Tenc,
            b"pssh" => KnownBox::Pssh,

            b"avc1" => KnownBox::Avc1,
            b"avc3" => KnownBox::Avc3,
            b"hev1" => KnownBox::Hev1,
            b"hvc1" => KnownBox::Hvc1,
            b"mp4v" => KnownBox::Mp4v,
            b"vp08" => KnownBox::Vp08,
            b"vp09" => KnownBox::Vp09,
            b"av01" => KnownBox::Av01,
            b"encv" => KnownBox::Encv,

            b"mp4a" => KnownBox::Mp4a,
            b"ac-3" => KnownBox::Ac3,
            b"ec-3" => KnownBox::Ec3,
            b"Opus" => KnownBox::Opus,
            b"fLaC" => KnownBox::Flac,
            b"alac" => KnownBox::Alac,
            b".mp3" => KnownBox::Mp3,
            b"lpcm" => KnownBox::Lpcm,
            b"sowt" => KnownBox::Sowt,
            b"twos" => KnownBox::Twos,
            b"enca" => KnownBox::Enca,

            b"uuid" => KnownBox::Uuid,

            _ => KnownBox::Unknown(cc),
        }
    }
}

impl KnownBox {
    /// Does this box *contain* child boxes (container semantics)?
    ///
    /// `udta` and `meta` are deliberately absent: their layouts vary between
    /// writers, so they are treated as opaque.
    pub fn is_container(&self) -> bool {
        matches!(
            self,
            KnownBox::Moov
                | KnownBox::Trak
                | KnownBox::Mdia
                | KnownBox::Minf
                | KnownBox::Stbl
                | KnownBox::Edts
                | KnownBox::Dinf
                | KnownBox::Moof
                | KnownBox::Mvex
                | KnownBox::Mfra
                | KnownBox::Traf
                | KnownBox::Sinf
                | KnownBox::Schi
                | KnownBox::Wave
        )
    }

    /// Visual sample entry types found inside `stsd`.
    pub fn is_video_entry(&self) -> bool {
        matches!(
            self,
            KnownBox::Avc1
                | KnownBox::Avc3
                | KnownBox::Hev1
                | KnownBox::Hvc1
                | KnownBox::Mp4v
                | KnownBox::Vp08
                | KnownBox::Vp09
                | KnownBox::Av01
                | KnownBox::Encv
        )
    }

    /// Audio sample entry types found inside `stsd`.
    pub fn is_audio_entry(&self) -> bool {
        matches!(
            self,
            KnownBox::Mp4a
                | KnownBox::Ac3
                | KnownBox::Ec3
                | KnownBox::Opus
                | KnownBox::Flac
                | KnownBox::Alac
                | KnownBox::Mp3
                | KnownBox::Lpcm
                | KnownBox::Sowt
                | KnownBox::Twos
                | KnownBox::Enca
        )
    }

    /// Human readable box name, as used by the box-tree logs.
    pub fn full_name(&self) -> &'static str {
        match self {
            KnownBox::Ftyp => "File Type Box",
            KnownBox::Moov => "Movie Box",
            KnownBox::Mdat => "Media Data Box",
            KnownBox::Free => "Free Space Box",
            KnownBox::Skip => "Free Space Box",
            KnownBox::Wide => "Wide Box",
            KnownBox::Meta => "Meta Box",
            KnownBox::Mfra => "Movie Fragment Random Access Box",
            KnownBox::Mvhd => "Movie Header Box",
            KnownBox::Trak => "Track Box",
            KnownBox::Mvex => "Movie Extends Box",
            KnownBox::Udta => "User Data Box",
            KnownBox::Tkhd => "Track Header Box",
            KnownBox::Edts => "Edit Box",
            KnownBox::Mdia => "Media Box",
            KnownBox::Elst => "Edit List Box",
            KnownBox::Mdhd => "Media Header Box",
            KnownBox::Hdlr => "Handler Reference Box",
            KnownBox::Minf => "Media Information Box",
            KnownBox::Vmhd => "Video Media Header Box",
            KnownBox::Smhd => "Sound Media Header Box",
            KnownBox::Dinf => "Data Information Box",
            KnownBox::Stbl => "Sample Table Box",
            KnownBox::Dref => "Data Reference Box",
            KnownBox::Stsd => "Sample Description Box",
            KnownBox::Stts => "Decoding Time to Sample Box",
            KnownBox::Ctts => "Composition Time to Sample Box",
            KnownBox::Stsc => "Sample To Chunk Box",
            KnownBox::Stsz => "Sample Size Box",
            KnownBox::Stz2 => "Compact Sample Size Box",
            KnownBox::Stco => "Chunk Offset Box",
            KnownBox::Co64 => "64-bit Chunk Offset Box",
            KnownBox::Stss => "Sync Sample Box",
            KnownBox::Mehd => "Movie Extends Header Box",
            KnownBox::Trex => "Track Extends Box",
            KnownBox::Moof => "Movie Fragment Box",
            KnownBox::Traf => "Track Fragment Box",
            KnownBox::Esds => "Elementary Stream Descriptor Box",
            KnownBox::Avcc => "AVC Configuration Box",
            KnownBox::Hvcc => "HEVC Configuration Box",
            KnownBox::Vpcc => "VP Codec Configuration Box",
            KnownBox::Av1c => "AV1 Codec Configuration Box",
            KnownBox::Dops => "Opus Specific Box",
            KnownBox::Dfla => "FLAC Specific Box",
            KnownBox::Wave => "QuickTime Sound Information Box",
            KnownBox::Sinf => "Protection Scheme Information Box",
            KnownBox::Frma => "Original Format Box",
            KnownBox::Schm => "Scheme Type Box",
            KnownBox::Schi => "Scheme Information Box",
            KnownBox::Tenc => "Track Encryption Box",
            KnownBox::Pssh => "Protection System Specific Header Box",
            KnownBox::Avc1 | KnownBox::Avc3 => "AVC Sample Entry",
            KnownBox::Hev1 | KnownBox::Hvc1 => "HEVC Sample Entry",
            KnownBox::Mp4v => "MPEG-4 Visual Sample Entry",
            KnownBox::Vp08 => "VP8 Sample Entry",
            KnownBox::Vp09 => "VP9 Sample Entry",
            KnownBox::Av01 => "AV1 Sample Entry",
            KnownBox::Encv => "Encrypted Video Sample Entry",
            KnownBox::Mp4a => "MPEG-4 Audio Sample Entry",
            KnownBox::Ac3 => "AC-3 Sample Entry",
            KnownBox::Ec3 => "Enhanced AC-3 Sample Entry",
            KnownBox::Opus => "Opus Sample Entry",
            KnownBox::Flac => "FLAC Sample Entry",
            KnownBox::Alac => "ALAC Sample Entry",
            KnownBox::Mp3 => "MP3 Sample Entry",
            KnownBox::Lpcm | KnownBox::Sowt | KnownBox::Twos => "PCM Sample Entry",
            KnownBox::Enca => "Encrypted Audio Sample Entry",
            KnownBox::Uuid => "User Extension Box",
            KnownBox::Unknown(_) => "Unknown Box",
        }
    }
}
