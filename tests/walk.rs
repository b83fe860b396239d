use qtatoms::{FourCC, KnownBox, ParseError, Parser, SchemaRegistry, Warning, parse};

fn atom(typ: &[u8; 4], body: &[u8]) -> Vec<u8> {
    atom_sized((body.len() + 8) as u32, typ, body)
}

fn atom_sized(size: u32, typ: &[u8; 4], body: &[u8]) -> Vec<u8> {
    let mut v = Vec::new();
    v.extend_from_slice(&size.to_be_bytes());
    v.extend_from_slice(typ);
    v.extend_from_slice(body);
    v
}

/// A parser that knows `moov` as a container and nothing else.
fn bare_parser() -> Parser {
    Parser::new(SchemaRegistry::new())
        .unwrap()
        .with_container(FourCC(*b"moov"))
}

#[test]
fn empty_buffer_is_an_empty_forest() {
    let tree = parse(&[]).unwrap();
    assert!(tree.is_empty());
    assert_eq!(tree.roots().count(), 0);
    assert!(tree.warnings().is_empty());
}

#[test]
fn adjacent_roots_keep_order_and_offsets() {
    let mut data = atom(b"free", &[0; 4]);
    data.extend(atom(b"skip", &[]));

    let tree = bare_parser().parse(&data).unwrap();
    let roots: Vec<_> = tree.roots().collect();
    assert_eq!(roots.len(), 2);
    assert_eq!(roots[0].typ, FourCC(*b"free"));
    assert_eq!(roots[0].offset, 0);
    assert_eq!(roots[0].size, 12);
    assert_eq!(roots[1].typ, FourCC(*b"skip"));
    assert_eq!(roots[1].offset, 12);
}

#[test]
fn container_children_come_from_its_content() {
    let mut content = atom(b"abcd", &[1, 2, 3, 4]);
    content.extend(atom(b"wxyz", &[]));
    let mut data = atom(b"moov", &content);
    // a root after the container must not be swallowed by it
    data.extend(atom(b"free", &[]));

    let tree = bare_parser().parse(&data).unwrap();
    let moov = tree.get("moov").unwrap();
    assert_eq!(moov.content_len, 20);

    let kids: Vec<_> = tree.children(moov).collect();
    assert_eq!(kids.len(), 2);
    assert_eq!(kids[0].offset, 8);
    assert_eq!(kids[0].content_len, 4);
    assert_eq!(kids[1].offset, 20);
    assert_eq!(kids[1].content_len, 0);

    assert_eq!(tree.keys("").unwrap(), vec!["moov", "free"]);
    assert_eq!(tree.get("free").unwrap().offset, 28);
}

#[test]
fn every_default_container_reads_exactly_its_content() {
    for typ in KnownBox::default_containers() {
        let mut content = atom(b"abcd", &[1, 2, 3, 4]);
        content.extend(atom(b"wxyz", &[]));
        let mut data = atom(&typ.0, &content);
        data.extend(atom(b"zzzz", &[]));

        let tree = Parser::default().parse(&data).unwrap();
        let roots: Vec<_> = tree.roots().collect();
        assert_eq!(roots.len(), 2, "{}", typ);
        assert_eq!(roots[0].typ, typ);
        assert_eq!(roots[0].content_len, 20, "{}", typ);

        let kids: Vec<_> = tree.children(roots[0]).collect();
        assert_eq!(kids.len(), 2, "{}", typ);
        assert_eq!((kids[0].offset, kids[0].content_len), (8, 4), "{}", typ);
        assert_eq!((kids[1].offset, kids[1].content_len), (20, 0), "{}", typ);
        assert_eq!(roots[1].offset, 28, "{}", typ);
    }
}

#[test]
fn oversized_child_is_clamped_to_its_container() {
    let content = atom_sized(100, b"abcd", &[9; 4]);
    let data = atom(b"moov", &content);

    let tree = bare_parser().parse(&data).unwrap();
    let child = tree.get("moov.abcd").unwrap();
    assert_eq!(child.size, 100);
    assert_eq!(child.content_len, 4);
}

#[test]
fn repeated_siblings_are_indexed() {
    let mut content = Vec::new();
    for _ in 0..3 {
        content.extend(atom(b"trak", &[]));
    }
    content.extend(atom(b"udta", &[]));
    let data = atom(b"moov", &content);

    let tree = parse(&data).unwrap();
    assert_eq!(
        tree.keys("moov").unwrap(),
        vec!["trak[0]", "trak[1]", "trak[2]", "udta"]
    );
    assert!(tree.get("moov.trak").is_none());
    assert_eq!(tree.get("moov.trak[0]").unwrap().offset, 8);
    assert_eq!(tree.get("moov.trak[2]").unwrap().offset, 24);
    assert_eq!(tree.get("moov.udta").unwrap().offset, 32);
}

#[test]
fn two_siblings_rename_the_first() {
    let mut data = atom(b"free", &[]);
    data.extend(atom(b"free", &[]));

    let tree = bare_parser().parse(&data).unwrap();
    assert_eq!(tree.keys("").unwrap(), vec!["free[0]", "free[1]"]);
    assert_eq!(tree.get("free[1]").unwrap().offset, 8);
}

#[test]
fn malformed_size_keeps_earlier_siblings() {
    let mut data = atom(b"free", &[]);
    data.extend(atom_sized(5, b"bad!", &[]));
    data.extend(atom(b"skip", &[]));

    let failure = bare_parser().parse(&data).unwrap_err();
    assert_eq!(failure.error, ParseError::MalformedBox { offset: 8, size: 5 });
    let partial: Vec<_> = failure.roots().collect();
    assert_eq!(partial.len(), 1);
    assert_eq!(partial[0].typ, FourCC(*b"free"));
    assert!(failure.partial.get("skip").is_none());
}

#[test]
fn zero_size_ends_the_container() {
    let mut content = atom(b"free", &[]);
    content.extend(atom_sized(0, b"free", &[]));
    content.extend(atom(b"skip", &[]));
    let data = atom(b"moov", &content);

    let tree = bare_parser().parse(&data).unwrap();
    let moov = tree.get("moov").unwrap();
    assert_eq!(moov.children.len(), 1);
    assert!(
        tree.warnings()
            .contains(&Warning::ZeroSizeBox { offset: 16 })
    );
}

#[test]
fn unknown_types_are_kept_and_reported() {
    let data = atom(b"zzzz", &[1, 2]);

    let tree = parse(&data).unwrap();
    let b = tree.get("zzzz").unwrap();
    assert!(b.payload.is_none());
    assert_eq!(
        tree.warnings(),
        &[Warning::UnknownBoxType {
            typ: FourCC(*b"zzzz"),
            offset: 0
        }]
    );
}

#[test]
fn short_tail_is_reported_as_trailing_bytes() {
    let mut data = atom(b"free", &[]);
    data.extend_from_slice(&[0, 0, 1]);

    let tree = bare_parser().parse(&data).unwrap();
    assert_eq!(tree.roots().count(), 1);
    assert!(
        tree.warnings()
            .contains(&Warning::TrailingBytes { offset: 8, len: 3 })
    );
}

#[test]
fn enumerate_is_pre_order_with_depths() {
    let trak = atom(b"trak", &atom(b"zzzz", &[]));
    let mut data = atom(b"moov", &trak);
    data.extend(atom(b"free", &[]));

    let tree = parse(&data).unwrap();
    let mut seen = Vec::new();
    tree.enumerate(|name, _, depth| seen.push((name.to_string(), depth)));
    assert_eq!(
        seen,
        vec![
            ("moov".to_string(), 0),
            ("trak".to_string(), 1),
            ("zzzz".to_string(), 2),
            ("free".to_string(), 0),
        ]
    );

    let depths: Vec<usize> = tree.walk().map(|(d, _)| d).collect();
    assert_eq!(depths, vec![0, 1, 2, 0]);
}

#[test]
fn deep_nesting_does_not_overflow() {
    let mut data = atom(b"free", &[]);
    for _ in 0..5_000 {
        data = atom(b"moov", &data);
    }

    let tree = bare_parser().parse(&data).unwrap();
    assert_eq!(tree.len(), 5_001);
    assert_eq!(tree.walk().last().map(|(d, _)| d), Some(5_000));
}

#[test]
fn fourcc_round_trips_through_u32() {
    let cc: FourCC = "moov".parse().unwrap();
    let code = cc.as_u32();
    assert_eq!(code, 0x6d6f_6f76);
    assert_eq!(FourCC::from(code).to_string(), "moov");

    assert!(matches!(
        "moo".parse::<FourCC>(),
        Err(ParseError::InvalidTypeName(_))
    ));
}
