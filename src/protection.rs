//! Common-encryption signalling: `sinf` under encrypted sample entries and
//! `pssh` under `moov`.

use crate::boxes::FourCC;
use crate::known_boxes::KnownBox;
use crate::parser::{BmffBox, ParseError, Region, Result, check_table_limit, skip_box, vec_push};
use byteorder::{BigEndian, NativeEndian, ReadBytesExt, WriteBytesExt};
use log::{debug, warn};
use serde::Serialize;
use std::io::{Cursor, Read};

/// Default encryption parameters from `tenc`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TrackEncryptionBox {
    pub is_encrypted: u8,
    pub iv_size: u8,
    pub kid: [u8; 16],
}

/// `sinf`: what an encrypted sample entry really holds and how it is
/// protected.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProtectionSchemeInfo {
    pub original_format: Option<FourCC>,
    pub scheme_type: Option<FourCC>,
    pub tenc: Option<TrackEncryptionBox>,
}

pub fn read_sinf(b: &mut BmffBox<'_>) -> Result<ProtectionSchemeInfo> {
    let mut sinf = ProtectionSchemeInfo::default();
    let mut iter = b.box_iter();
    while let Some(mut child) = iter.next_box()? {
        match child.kind() {
            KnownBox::Frma => {
                sinf.original_format = Some(child.read_fourcc()?);
                child.skip_remain()?;
            }
            KnownBox::Schm => sinf.scheme_type = Some(read_schm(&mut child)?),
            KnownBox::Schi => sinf.tenc = read_schi(&mut child)?,
            _ => skip_box(&mut child)?,
        }
    }
    b.skip_remain()?;
    debug!("sinf {:?}", sinf);
    Ok(sinf)
}

fn read_schm(b: &mut BmffBox<'_>) -> Result<FourCC> {
    b.read_fullbox_extra()?;
    let scheme_type = b.read_fourcc()?;
    // scheme_version, optional URI
    b.skip_remain()?;
    Ok(scheme_type)
}

fn read_schi(b: &mut BmffBox<'_>) -> Result<Option<TrackEncryptionBox>> {
    let mut tenc = None;
    let mut iter = b.box_iter();
    while let Some(mut child) = iter.next_box()? {
        match child.kind() {
            KnownBox::Tenc => {
                if tenc.is_some() {
                    return Err(ParseError::InvalidData("more than one tenc in schi"));
                }
                tenc = Some(read_tenc(&mut child)?);
            }
            _ => skip_box(&mut child)?,
        }
    }
    b.skip_remain()?;
    Ok(tenc)
}

fn read_tenc(b: &mut BmffBox<'_>) -> Result<TrackEncryptionBox> {
    b.read_fullbox_extra()?;
    // reserved, then the crypt/skip pattern of version 1
    b.skip(2)?;
    let is_encrypted = b.read_u8()?;
    let iv_size = b.read_u8()?;
    let mut kid = [0u8; 16];
    kid.copy_from_slice(&b.read_buf(16)?);
    // constant IV, when iv_size is 0
    b.skip_remain()?;
    Ok(TrackEncryptionBox { is_encrypted, iv_size, kid })
}

/// One `pssh` box.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PsshBox {
    pub system_id: [u8; 16],
    /// Key ids listed by version 1 boxes.
    pub kids: Vec<[u8; 16]>,
    pub data: Vec<u8>,
    /// The complete box, header included, as a CDM expects it.
    pub box_content: Vec<u8>,
}

fn read_id(cur: &mut Cursor<&[u8]>) -> Result<[u8; 16]> {
    let mut id = [0u8; 16];
    cur.read_exact(&mut id)?;
    Ok(id)
}

pub fn read_pssh(b: &mut BmffBox<'_>) -> Result<PsshBox> {
    let left = b
        .bytes_left()
        .ok_or(ParseError::InvalidData("pssh must declare its size"))?;
    let payload = b.read_buf(left)?;

    let mut cur = Cursor::new(payload.as_slice());
    let version = cur.read_u8()?;
    cur.read_u24::<BigEndian>()?; // flags
    let system_id = read_id(&mut cur)?;
    let mut kids = Vec::new();
    if version > 0 {
        let count = cur.read_u32::<BigEndian>()?;
        check_table_limit(count)?;
        for _ in 0..count {
            vec_push(&mut kids, read_id(&mut cur)?)?;
        }
    }
    let data_size = cur.read_u32::<BigEndian>()?;
    let start = cur.position() as usize;
    let data = start
        .checked_add(data_size as usize)
        .and_then(|end| payload.get(start..end))
        .ok_or(ParseError::InvalidData("pssh data exceeds its box"))?
        .to_vec();
    if start + data.len() != payload.len() {
        warn!("pssh carries {} trailing bytes", payload.len() - start - data.len());
    }

    // The header is rewritten in compact form.
    let size = u32::try_from(payload.len() + 8)
        .map_err(|_| ParseError::InvalidData("pssh too large"))?;
    let mut box_content = Vec::new();
    box_content.try_reserve_exact(payload.len() + 8)?;
    box_content.write_u32::<BigEndian>(size)?;
    box_content.extend_from_slice(b"pssh");
    box_content.extend_from_slice(&payload);

    debug!("pssh version={} kids={} data={} bytes", version, kids.len(), data.len());
    Ok(PsshBox { system_id, kids, data, box_content })
}

/// Concatenate every `pssh` for an EME client: per box, the system id, the
/// box length as a native-endian u32, then the box itself.
pub fn serialize_pssh(psshs: &[PsshBox]) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    for pssh in psshs {
        let len = u32::try_from(pssh.box_content.len())
            .map_err(|_| ParseError::InvalidData("pssh too large"))?;
        out.try_reserve(pssh.box_content.len() + 20)?;
        out.extend_from_slice(&pssh.system_id);
        out.write_u32::<NativeEndian>(len)?;
        out.extend_from_slice(&pssh.box_content);
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::{BoxIter, Stream};

    fn boxed(typ: &[u8; 4], payload: &[u8]) -> Vec<u8> {
        let mut data = ((payload.len() + 8) as u32).to_be_bytes().to_vec();
        data.extend_from_slice(typ);
        data.extend_from_slice(payload);
        data
    }

    fn with_box<T>(data: Vec<u8>, f: impl FnOnce(&mut BmffBox<'_>) -> T) -> T {
        let mut stream = Stream::new(std::io::Cursor::new(data));
        let mut iter = BoxIter::new(&mut stream, 0);
        let mut b = iter.next_box().expect("header").expect("one box");
        f(&mut b)
    }

    fn tenc(kid: u8) -> Vec<u8> {
        let mut p = vec![0, 0, 0, 0, 0, 0, 1, 8];
        p.extend_from_slice(&[kid; 16]);
        boxed(b"tenc", &p)
    }

    #[test]
    fn sinf_collects_format_scheme_and_keys() {
        let mut schm = vec![0, 0, 0, 0];
        schm.extend_from_slice(b"cenc");
        schm.extend_from_slice(&0x10000u32.to_be_bytes());
        let mut payload = boxed(b"frma", b"avc1");
        payload.extend(boxed(b"schm", &schm));
        payload.extend(boxed(b"schi", &tenc(0x42)));

        let sinf = with_box(boxed(b"sinf", &payload), read_sinf).expect("valid sinf");
        assert_eq!(sinf.original_format, Some(FourCC(*b"avc1")));
        assert_eq!(sinf.scheme_type, Some(FourCC(*b"cenc")));
        let tenc = sinf.tenc.expect("tenc");
        assert_eq!(tenc.is_encrypted, 1);
        assert_eq!(tenc.iv_size, 8);
        assert_eq!(tenc.kid, [0x42; 16]);
    }

    #[test]
    fn second_tenc_is_invalid() {
        let mut schi = tenc(1);
        schi.extend(tenc(2));
        let sinf = boxed(b"sinf", &boxed(b"schi", &schi));
        assert!(matches!(with_box(sinf, read_sinf), Err(ParseError::InvalidData(_))));
    }

    #[test]
    fn pssh_v1_lists_key_ids() {
        let mut p = vec![1, 0, 0, 0];
        p.extend_from_slice(&[0xEE; 16]);
        p.extend_from_slice(&2u32.to_be_bytes());
        p.extend_from_slice(&[0x01; 16]);
        p.extend_from_slice(&[0x02; 16]);
        p.extend_from_slice(&3u32.to_be_bytes());
        p.extend_from_slice(&[9, 8, 7]);
        let data = boxed(b"pssh", &p);

        let pssh = with_box(data.clone(), read_pssh).expect("valid pssh");
        assert_eq!(pssh.system_id, [0xEE; 16]);
        assert_eq!(pssh.kids, vec![[0x01; 16], [0x02; 16]]);
        assert_eq!(pssh.data, vec![9, 8, 7]);
        assert_eq!(pssh.box_content, data);

        let blob = serialize_pssh(&[pssh]).expect("serialize");
        assert_eq!(&blob[..16], &[0xEE; 16]);
        assert_eq!(&blob[16..20], &(data.len() as u32).to_ne_bytes());
        assert_eq!(&blob[20..], data.as_slice());
    }

    #[test]
    fn pssh_data_must_fit() {
        let mut p = vec![0, 0, 0, 0];
        p.extend_from_slice(&[0xEE; 16]);
        p.extend_from_slice(&64u32.to_be_bytes());
        p.extend_from_slice(&[1, 2]);
        assert!(matches!(with_box(boxed(b"pssh", &p), read_pssh), Err(ParseError::InvalidData(_))));
    }
}
