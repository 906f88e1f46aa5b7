use serial_parity::codec::{self, Format};
use serial_parity::hash::{DEFAULT_SEED, fold_bytes, fold_count, fold_signed_int};
use serial_parity::{Digest, EncodeError, Error, FoldOptions, KeyOrder, Value, fold_value};

fn concrete_tree() -> Value {
    Value::map([("x", Value::Int(1)), ("y", Value::str("hi"))])
}

fn concrete_digest() -> Digest {
    let s = fold_bytes(DEFAULT_SEED, b"x");
    let s = fold_signed_int(s, 1);
    let s = fold_bytes(s, b"y");
    let s = fold_bytes(s, b"hi");
    Digest(fold_count(s, 2))
}

#[test]
fn concrete_scenario_on_every_encode_and_decode_path() {
    let opts = FoldOptions::default();
    let expected = concrete_digest();
    assert_eq!(fold_value(&concrete_tree(), &opts).unwrap(), expected);
    for codec in codec::all() {
        let encoded = codec.encode(&concrete_tree(), &opts).unwrap();
        assert_eq!(encoded.digest, expected, "encode {}", codec.name());
        assert_eq!(codec.decode(&encoded.bytes, &opts).unwrap(), expected, "decode {}", codec.name());
    }
}

#[test]
fn hand_written_documents_decode_to_the_concrete_digest() {
    let opts = FoldOptions::default();
    let json = br#"{ "x": 1, "y": "hi" }"#;
    let msgpack = [0x82, 0xa1, b'x', 0x01, 0xa1, b'y', 0xa2, b'h', b'i'];
    let bson = [
        22, 0, 0, 0,
        0x10, b'x', 0, 1, 0, 0, 0,
        0x02, b'y', 0, 3, 0, 0, 0, b'h', b'i', 0,
        0,
    ];
    let ubjson = b"{i\x01xi\x01i\x01ySi\x02hi}";
    for codec in codec::all() {
        let bytes: &[u8] = match codec.format() {
            Format::Json => json,
            Format::MessagePack => &msgpack,
            Format::Bson => &bson,
            Format::Ubjson => ubjson,
        };
        assert_eq!(codec.decode(bytes, &opts).unwrap(), concrete_digest(), "{}", codec.name());
    }
}

#[test]
fn map_order_changes_the_digest_unless_sorted() {
    let ab = Value::map([("a", Value::Int(1)), ("b", Value::Int(2))]);
    let ba = Value::map([("b", Value::Int(2)), ("a", Value::Int(1))]);
    let preserve = FoldOptions::default();
    let sorted = FoldOptions::default().with_key_order(KeyOrder::Sorted);
    for codec in codec::all() {
        let ab_enc = codec.encode(&ab, &preserve).unwrap();
        let ba_enc = codec.encode(&ba, &preserve).unwrap();
        assert_ne!(ab_enc.digest, ba_enc.digest, "{}", codec.name());
        assert_ne!(codec.decode(&ab_enc.bytes, &preserve).unwrap(), codec.decode(&ba_enc.bytes, &preserve).unwrap());

        assert_eq!(
            codec.decode(&ab_enc.bytes, &sorted).unwrap(),
            codec.decode(&ba_enc.bytes, &sorted).unwrap(),
            "{}",
            codec.name()
        );
    }
}

#[test]
fn empty_list_and_empty_map_fold_alike() {
    let opts = FoldOptions::default();
    let expected = Digest(fold_count(DEFAULT_SEED, 0));
    for codec in codec::all() {
        for tree in [Value::List(vec![]), Value::Map(vec![])] {
            let encoded = codec.encode(&tree, &opts).unwrap();
            assert_eq!(encoded.digest, expected);
            assert_eq!(codec.decode(&encoded.bytes, &opts).unwrap(), expected, "{}", codec.name());
        }
    }
}

#[test]
fn integer_width_does_not_change_the_digest() {
    let opts = FoldOptions::default();
    let expected = fold_value(&Value::list([Value::Int(200)]), &opts).unwrap();
    assert_eq!(fold_value(&Value::list([Value::UInt(200)]), &opts).unwrap(), expected);

    let as_uint8: &[u8] = &[0x91, 0xcc, 200];
    let as_int64: &[u8] = &[0x91, 0xd3, 0, 0, 0, 0, 0, 0, 0, 200];
    let as_uint64: &[u8] = &[0x91, 0xcf, 0, 0, 0, 0, 0, 0, 0, 200];
    for codec in codec::all().filter(|c| c.format() == Format::MessagePack) {
        for bytes in [as_uint8, as_int64, as_uint64] {
            assert_eq!(codec.decode(bytes, &opts).unwrap(), expected, "{} {bytes:?}", codec.name());
        }
    }
    for codec in codec::all().filter(|c| c.format() == Format::Json) {
        assert_eq!(codec.decode(b"[200]", &opts).unwrap(), expected, "{}", codec.name());
    }

    let as_int32: &[u8] = &[12, 0, 0, 0, 0x10, b'0', 0, 200, 0, 0, 0, 0];
    let as_int64: &[u8] = &[16, 0, 0, 0, 0x12, b'0', 0, 200, 0, 0, 0, 0, 0, 0, 0, 0];
    for codec in codec::all().filter(|c| c.format() == Format::Bson) {
        for bytes in [as_int32, as_int64] {
            assert_eq!(codec.decode(bytes, &opts).unwrap(), expected, "{} {bytes:?}", codec.name());
        }
    }

    let forms: [&[u8]; 3] = [b"[U\xc8]", b"[#i\x01I\x00\xc8", b"[$L#i\x01\0\0\0\0\0\0\0\xc8"];
    for codec in codec::all().filter(|c| c.format() == Format::Ubjson) {
        for bytes in forms {
            assert_eq!(codec.decode(bytes, &opts).unwrap(), expected, "{} {bytes:?}", codec.name());
        }
    }
}

#[test]
fn formats_without_a_wide_unsigned_refuse_it() {
    let opts = FoldOptions::default();
    let tree = Value::map([("big", Value::UInt(u64::MAX))]);
    for codec in codec::all() {
        match codec.format() {
            Format::Json | Format::MessagePack => {
                let encoded = codec.encode(&tree, &opts).unwrap();
                assert_eq!(codec.decode(&encoded.bytes, &opts).unwrap(), encoded.digest, "{}", codec.name());
            }
            Format::Bson | Format::Ubjson => {
                let err = codec.encode(&tree, &opts).unwrap_err();
                assert!(matches!(err, Error::Encode(EncodeError::Unrepresentable { .. })), "{}: {err}", codec.name());
            }
        }
    }
}

#[test]
fn seed_is_part_of_the_comparison() {
    let tree = concrete_tree();
    let a = fold_value(&tree, &FoldOptions::default()).unwrap();
    let b = fold_value(&tree, &FoldOptions::default().with_seed(7)).unwrap();
    assert_ne!(a, b);
}
