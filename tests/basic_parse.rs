use mp4probe::boxes::FourCC;
use mp4probe::parser::{BoxIter, Stream, read_box_header};
use mp4probe::{MediaContext, ParseError, read_mp4};
use std::io::Cursor;

fn make_minimal_file() -> Vec<u8> {
    // [ftyp box]
    // size: 24 (0x18), type: "ftyp", payload: 16 bytes
    let mut v = Vec::new();

    // size = 24
    v.extend_from_slice(&24u32.to_be_bytes());
    v.extend_from_slice(b"ftyp");
    // major brand "isom"
    v.extend_from_slice(b"isom");
    // minor version
    v.extend_from_slice(&512u32.to_be_bytes());
    // compatible brands "isom" and "mp41"
    v.extend_from_slice(b"isom");
    v.extend_from_slice(b"mp41");

    v
}

#[test]
fn read_single_ftyp_header() {
    let mut stream = Stream::new(Cursor::new(make_minimal_file()));

    let hdr = read_box_header(&mut stream)
        .expect("read_box_header failed")
        .expect("header present");

    assert_eq!(hdr.size, Some(24));
    assert_eq!(hdr.typ, FourCC(*b"ftyp"));
    assert_eq!(hdr.header_size, 8);
    assert_eq!(hdr.uuid, None);
}

#[test]
fn leaf_box_has_no_children() {
    let mut stream = Stream::new(Cursor::new(make_minimal_file()));
    let mut iter = BoxIter::new(&mut stream, 0);

    let mut ftyp = iter.next_box().expect("next_box failed").expect("ftyp");
    ftyp.skip(16).expect("payload");
    assert!(ftyp.box_iter().next_box().expect("empty region").is_none());
    assert!(iter.next_box().expect("end of stream").is_none());
}

#[test]
fn ftyp_only_file_has_no_moov() {
    let mut context = MediaContext::new();
    let err = read_mp4(Cursor::new(make_minimal_file()), &mut context).expect_err("no moov");
    assert!(matches!(err, ParseError::NoMoov));

    let ftyp = context.file_type.expect("ftyp decoded");
    assert_eq!(ftyp.major_brand, FourCC(*b"isom"));
    assert_eq!(ftyp.minor_version, 512);
    assert_eq!(ftyp.compatible_brands, vec![FourCC(*b"isom"), FourCC(*b"mp41")]);
}
