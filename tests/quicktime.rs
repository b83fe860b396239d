use qtatoms::{Decoded, RawValue, decode::MAC_EPOCH_OFFSET, parse, to_json};

fn atom(typ: &[u8; 4], body: &[u8]) -> Vec<u8> {
    let mut v = ((body.len() + 8) as u32).to_be_bytes().to_vec();
    v.extend_from_slice(typ);
    v.extend_from_slice(body);
    v
}

fn be32(v: &mut Vec<u8>, x: u32) {
    v.extend_from_slice(&x.to_be_bytes());
}

/// 2001-02-03T04:05:06Z in QuickTime seconds.
const CREATED: u32 = (MAC_EPOCH_OFFSET + 981_173_106) as u32;

fn make_mvhd() -> Vec<u8> {
    let mut b = vec![0, 0, 0, 0]; // version + flags
    be32(&mut b, CREATED);
    be32(&mut b, CREATED + 60);
    be32(&mut b, 600); // time scale
    be32(&mut b, 1200); // duration
    be32(&mut b, 0x0001_0000); // rate 1.0
    b.extend_from_slice(&0x0100u16.to_be_bytes()); // volume 1.0
    b.extend_from_slice(&[0; 10]);
    for m in [0x0001_0000, 0, 0, 0, 0x0001_0000, 0, 0, 0, 0x4000_0000] {
        be32(&mut b, m);
    }
    for _ in 0..6 {
        be32(&mut b, 0);
    }
    be32(&mut b, 2); // next track id
    assert_eq!(b.len(), 100);
    atom(b"mvhd", &b)
}

fn make_mdhd(version: u8) -> Vec<u8> {
    let mut b = vec![version, 0, 0, 0];
    be32(&mut b, CREATED);
    be32(&mut b, CREATED);
    be32(&mut b, 44_100);
    be32(&mut b, 88_200);
    b.extend_from_slice(&[0x55, 0xc4, 0, 0]);
    atom(b"mdhd", &b)
}

#[test]
fn movie_header_fields_are_decoded() {
    let data = atom(b"moov", &make_mvhd());
    let tree = parse(&data).unwrap();

    let mvhd = tree.get("moov.mvhd").unwrap();
    assert_eq!(mvhd.offset, 8);
    assert_eq!(mvhd.size, 108);

    assert_eq!(tree.field("moov.mvhd", "time_scale").unwrap().raw.as_u64(), Some(600));
    assert_eq!(tree.field("moov.mvhd", "duration").unwrap().raw.as_u64(), Some(1200));

    let rate = tree.field("moov.mvhd", "preferred_rate").unwrap();
    assert_eq!(rate.decoded.as_ref().and_then(Decoded::as_f64), Some(1.0));
    let volume = tree.field("moov.mvhd", "preferred_volume").unwrap();
    assert_eq!(volume.decoded.as_ref().and_then(Decoded::as_f64), Some(1.0));

    let created = tree.field("moov.mvhd", "creation_time").unwrap();
    let ts = created.decoded.as_ref().and_then(Decoded::as_date).unwrap();
    assert_eq!(ts.unix_seconds(), 981_173_106);
    assert_eq!(ts.to_string(), "2001-02-03T04:05:06Z");

    let matrix = tree.field("moov.mvhd", "matrix").unwrap();
    assert_eq!(
        matrix.decoded.as_ref().and_then(Decoded::as_matrix),
        Some(&[[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]])
    );
    assert!(matrix.pending_encoding().is_none());

    assert_eq!(tree.field("moov.mvhd", "next_track_id").unwrap().raw.as_u64(), Some(2));
    assert!(tree.warnings().is_empty());
}

#[test]
fn unsupported_version_stops_at_the_header() {
    let mdia = atom(b"mdia", &make_mdhd(1));
    let data = atom(b"moov", &atom(b"trak", &mdia));

    let tree = parse(&data).unwrap();
    let payload = tree.get("moov.trak.mdia.mdhd").unwrap().payload.as_ref().unwrap();
    assert!(payload.is_empty());

    let tree = parse(&atom(b"moov", &atom(b"trak", &atom(b"mdia", &make_mdhd(0))))).unwrap();
    assert_eq!(
        tree.field("moov.trak.mdia.mdhd", "time_scale").unwrap().raw.as_u64(),
        Some(44_100)
    );
}

#[test]
fn file_type_brands() {
    let mut body = b"qt  ".to_vec();
    be32(&mut body, 0x2005_0300);
    body.extend_from_slice(b"qt  isom");
    let tree = parse(&atom(b"ftyp", &body)).unwrap();

    let major = tree.field("ftyp", "major_brand").unwrap();
    assert_eq!(major.decoded.as_ref().and_then(Decoded::as_code), Some("qt  "));

    let brands = tree.field("ftyp", "compatible_brands").unwrap();
    assert_eq!(
        brands.decoded,
        Some(Decoded::Sequence(vec![
            Decoded::Code("qt  ".into()),
            Decoded::Code("isom".into()),
        ]))
    );
}

#[test]
fn sample_tables() {
    let mut stts = vec![0, 0, 0, 0];
    be32(&mut stts, 2);
    for (count, duration) in [(10, 512), (1, 256)] {
        be32(&mut stts, count);
        be32(&mut stts, duration);
    }

    // non-zero sample size: no table follows
    let mut stsz = vec![0, 0, 0, 0];
    be32(&mut stsz, 1024);
    be32(&mut stsz, 11);

    let mut stbl = atom(b"stts", &stts);
    stbl.extend(atom(b"stsz", &stsz));
    let data = atom(b"stbl", &stbl);

    let tree = parse(&data).unwrap();
    let table = tree.field("stbl.stts", "time_to_sample_table").unwrap();
    let rows = table.raw.as_sequence().unwrap();
    assert_eq!(rows.len(), 2);
    let first = rows[0].as_struct().unwrap();
    assert_eq!(first.get("sample_count").unwrap().raw.as_u64(), Some(10));
    assert_eq!(first.get("sample_duration").unwrap().raw.as_u64(), Some(512));

    let sizes = tree.field("stbl.stsz", "sample_size_table").unwrap();
    assert_eq!(sizes.raw, RawValue::Sequence(Vec::new()));
}

#[test]
fn handler_name_is_a_pascal_string() {
    let mut body = vec![0, 0, 0, 0];
    body.extend_from_slice(b"mhlrvide");
    body.extend_from_slice(&[0; 12]);
    body.push(5);
    body.extend_from_slice(b"Video");
    let tree = parse(&atom(b"hdlr", &body)).unwrap();

    let subtype = tree.field("hdlr", "component_subtype").unwrap();
    assert_eq!(subtype.decoded.as_ref().and_then(Decoded::as_code), Some("vide"));
    let name = tree.field("hdlr", "component_name").unwrap();
    assert_eq!(name.decoded.as_ref().and_then(Decoded::as_text), Some("Video"));
}

#[test]
fn iso_handler_name_does_not_stop_the_parse() {
    let mut hdlr = vec![0, 0, 0, 0];
    be32(&mut hdlr, 0); // pre_defined
    hdlr.extend_from_slice(b"vide");
    hdlr.extend_from_slice(&[0; 12]);
    hdlr.extend_from_slice(b"VideoHandler\0");

    let mut vmhd = vec![0, 0, 0, 1];
    vmhd.extend_from_slice(&[0; 8]);
    let minf = atom(b"minf", &atom(b"vmhd", &vmhd));

    let mut mdia = atom(b"hdlr", &hdlr);
    mdia.extend(minf);
    let mut data = atom(b"moov", &atom(b"trak", &atom(b"mdia", &mdia)));
    data.extend(atom(b"mdat", &[0xde, 0xad]));

    let tree = parse(&data).unwrap();
    let name = tree.field("moov.trak.mdia.hdlr", "component_name").unwrap();
    assert_eq!(name.decoded.as_ref().and_then(Decoded::as_text), Some("VideoHandler"));
    let subtype = tree.field("moov.trak.mdia.hdlr", "component_subtype").unwrap();
    assert_eq!(subtype.decoded.as_ref().and_then(Decoded::as_code), Some("vide"));
    assert!(tree.get("moov.trak.mdia.minf.vmhd").is_some());
    assert_eq!(tree.keys("").unwrap(), vec!["moov", "mdat"]);
}

#[test]
fn json_rendering() {
    let data = atom(b"moov", &make_mvhd());
    let tree = parse(&data).unwrap();
    let json = to_json(&tree, 16).unwrap();

    let moov = &json[0];
    assert_eq!(moov["type"], "moov");
    assert_eq!(moov["kind"], "container");
    assert_eq!(moov["size"], 116);

    let mvhd = &moov["children"][0];
    assert_eq!(mvhd["name"], "Movie Header Atom");
    assert_eq!(mvhd["offset"], 8);
    assert_eq!(mvhd["kind"], "leaf");
    assert_eq!(mvhd["payload"]["time_scale"]["raw"], 600);
    assert_eq!(mvhd["payload"]["preferred_rate"]["decoded"], 1.0);
    assert_eq!(
        mvhd["payload"]["creation_time"]["decoded"],
        "2001-02-03T04:05:06Z"
    );
}
