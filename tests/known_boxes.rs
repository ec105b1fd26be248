use mp4probe::boxes::FourCC;
use mp4probe::known_boxes::KnownBox;
use mp4probe::Codec;

#[test]
fn known_box_from_ftyp() {
    let cc = FourCC(*b"ftyp");
    let kb = KnownBox::from(cc);
    assert!(matches!(kb, KnownBox::Ftyp));
    assert_eq!(kb.full_name(), "File Type Box");
}

#[test]
fn known_box_classifies_container() {
    let moov = KnownBox::from(FourCC(*b"moov"));
    assert!(moov.is_container());

    let ftyp = KnownBox::from(FourCC(*b"ftyp"));
    assert!(!ftyp.is_container());

    // Opaque on purpose.
    assert!(!KnownBox::from(FourCC(*b"udta")).is_container());
}

#[test]
fn protection_boxes_are_named() {
    let tenc = KnownBox::from(FourCC(*b"tenc"));
    assert_eq!(tenc, KnownBox::Tenc);
    assert_eq!(tenc.full_name(), "Track Encryption Box");
    assert_eq!(KnownBox::from(FourCC(*b"pssh")), KnownBox::Pssh);

    // schi holds tenc, so it is walked like any other container.
    assert!(KnownBox::from(FourCC(*b"schi")).is_container());
}

#[test]
fn unknown_fourcc_is_preserved() {
    let cc = FourCC(*b"zzzz");
    assert_eq!(KnownBox::from(cc), KnownBox::Unknown(cc));
    assert_eq!(KnownBox::from(cc).full_name(), "Unknown Box");
}

#[test]
fn sample_entries_map_to_codecs() {
    let entry = |s: &str| KnownBox::from(FourCC::from_str(s).expect("four chars"));
    assert!(entry("avc1").is_video_entry());
    assert!(entry("mp4a").is_audio_entry());
    assert!(!entry("mp4a").is_video_entry());
    assert_eq!(Codec::from(entry("hvc1")), Codec::Hevc);
    assert_eq!(Codec::from(entry("vp09")), Codec::Vp9);
    assert_eq!(Codec::from(entry("Opus")), Codec::Opus);
    assert_eq!(Codec::from(entry("fLaC")), Codec::Flac);
    assert_eq!(Codec::from(entry("sowt")), Codec::Lpcm);
    // Resolved through esds, not the entry type.
    assert_eq!(Codec::from(entry("mp4a")), Codec::Unknown);
}
