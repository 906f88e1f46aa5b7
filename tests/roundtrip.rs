use proptest::prelude::*;
use serial_parity::codec::{self, Codec, Format};
use serial_parity::generate::generate;
use serial_parity::{FoldOptions, KeyOrder, Value, fold_value};

fn assert_round_trip(codec: &dyn Codec, tree: &Value, opts: &FoldOptions) {
    let reference = fold_value(tree, opts).unwrap();
    let encoded = codec.encode(tree, opts).unwrap();
    assert_eq!(encoded.digest, reference, "encode {}", codec.name());
    for reader in codec::all().filter(|r| r.format() == codec.format()) {
        let decoded = reader.decode(&encoded.bytes, opts).unwrap();
        assert_eq!(decoded, reference, "{} -> {}", codec.name(), reader.name());
    }
}

#[test]
fn generated_trees_round_trip_through_every_codec() {
    let opts = FoldOptions::default();
    for size in [1, 10, 100, 1_000, 10_000] {
        let tree = generate(size, 0x5eed);
        for codec in codec::all() {
            assert_round_trip(codec, &tree, &opts);
        }
    }
}

#[test]
fn sorted_key_order_round_trips_too() {
    let opts = FoldOptions::default().with_key_order(KeyOrder::Sorted);
    let tree = generate(2_000, 11);
    for codec in codec::all() {
        assert_round_trip(codec, &tree, &opts);
    }
    let preserve = fold_value(&tree, &FoldOptions::default()).unwrap();
    assert_ne!(fold_value(&tree, &opts).unwrap(), preserve);
}

#[test]
fn encoding_is_deterministic() {
    let opts = FoldOptions::default();
    let tree = generate(1_000, 99);
    for codec in codec::all() {
        let first = codec.encode(&tree, &opts).unwrap();
        let second = codec.encode(&generate(1_000, 99), &opts).unwrap();
        assert_eq!(first, second, "{}", codec.name());
    }
}

#[test]
fn distinct_trees_get_distinct_digests() {
    let opts = FoldOptions::default();
    let digests: Vec<_> = (0..50).map(|seed| fold_value(&generate(300, seed), &opts).unwrap()).collect();
    let mut unique = digests.clone();
    unique.sort_by_key(|d| d.0);
    unique.dedup();
    assert_eq!(unique.len(), digests.len());
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn any_seed_round_trips(seed in any::<u64>(), size in 1usize..400) {
        let tree = generate(size, seed);
        prop_assert_eq!(tree.node_count(), size);
        for codec in codec::all() {
            assert_round_trip(codec, &tree, &FoldOptions::default());
        }
    }

    #[test]
    fn integers_round_trip_at_any_width(i in any::<i64>(), u in 0..=i64::MAX as u64) {
        let tree = Value::list([Value::Int(i), Value::UInt(u)]);
        for codec in codec::all() {
            assert_round_trip(codec, &tree, &FoldOptions::default());
        }
    }

    #[test]
    fn wide_unsigned_integers_round_trip_where_carried(u in (i64::MAX as u64 + 1)..=u64::MAX) {
        let tree = Value::list([Value::UInt(u)]);
        for codec in codec::all().filter(|c| matches!(c.format(), Format::Json | Format::MessagePack)) {
            assert_round_trip(codec, &tree, &FoldOptions::default());
        }
    }

    #[test]
    fn doubles_round_trip(d in proptest::num::f64::NORMAL) {
        let tree = Value::map([("d", Value::Double(d))]);
        for codec in codec::all() {
            assert_round_trip(codec, &tree, &FoldOptions::default());
        }
    }
}
