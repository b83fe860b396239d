use proptest::prelude::*;
use qtatoms::{Parser, parse, to_json};

fn atom(typ: &[u8; 4], body: &[u8]) -> Vec<u8> {
    let mut v = ((body.len() + 8) as u32).to_be_bytes().to_vec();
    v.extend_from_slice(typ);
    v.extend_from_slice(body);
    v
}

proptest! {
    #[test]
    fn arbitrary_bytes_never_panic(data in proptest::collection::vec(any::<u8>(), 0..512)) {
        let tree = match parse(&data) {
            Ok(tree) => tree,
            Err(failure) => failure.partial,
        };
        // every box lies inside the buffer
        for (_, b) in tree.walk() {
            prop_assert!(b.offset as usize + 8 <= data.len());
            prop_assert!(b.content_offset() as usize + b.content_len as usize <= data.len());
        }
        prop_assert!(to_json(&tree, 64).is_ok());
    }

    #[test]
    fn mutated_sample_table_never_panics(
        body in proptest::collection::vec(any::<u8>(), 0..128),
        kind in prop::sample::select(vec![
            *b"stts", *b"stsd", *b"dref", *b"elst", *b"stsz", *b"hdlr",
        ]),
    ) {
        let data = atom(b"stbl", &atom(&kind, &body));
        let _ = Parser::default().parse(&data);
    }

    #[test]
    fn well_formed_siblings_are_all_found(sizes in proptest::collection::vec(0usize..32, 1..16)) {
        let mut data = Vec::new();
        for &n in &sizes {
            data.extend(atom(b"free", &vec![0xab; n]));
        }
        let tree = parse(&data).unwrap();
        prop_assert_eq!(tree.roots().count(), sizes.len());

        let mut offset = 0u64;
        for (b, &n) in tree.roots().zip(&sizes) {
            prop_assert_eq!(b.offset, offset);
            prop_assert_eq!(b.content_len as usize, n);
            offset += n as u64 + 8;
        }
    }
}
