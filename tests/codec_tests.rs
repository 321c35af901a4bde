//! Key codec properties: partition determinism, comparator agreement and
//! direction handling.

mod common;

use std::cmp::Ordering;

use stagec_core::id::PortId;
use stagec_core::types::Scalar;
use stagec_shuffle::{ByteComparator, ObjectComparator, ShuffleCodec, ShuffleError};

fn codec() -> ShuffleCodec {
    let yaml = common::TOTALS.replace(
        "key: { group: [store] }",
        "key: { group: [store], order: [{ property: amount, direction: desc }] }",
    );
    let (_, compiled) = common::compile(&yaml);
    compiled.codec
}

fn key(codec: &ShuffleCodec, store: i32, amount: Option<i64>) -> Vec<u8> {
    let amount = amount.map(Scalar::I64).unwrap_or(Scalar::Null);
    let record = common::record(vec![Scalar::I32(store), amount]);
    let key = codec
        .keys
        .key_of(PortId::new(0), &record)
        .expect("key extraction");
    codec.keys.encode(&key).expect("encode")
}

fn samples(codec: &ShuffleCodec) -> Vec<Vec<u8>> {
    let mut keys = Vec::new();
    for store in [-3, 0, 1, 2, i32::MAX] {
        for amount in [None, Some(-1), Some(0), Some(7), Some(i64::MIN)] {
            keys.push(key(codec, store, amount));
        }
    }
    keys
}

#[test]
fn partition_is_deterministic_and_in_range() {
    let codec = codec();
    for bytes in samples(&codec) {
        let first = codec.partitioner.try_partition(&bytes, 7).expect("partition");
        let again = codec.partitioner.try_partition(&bytes, 7).expect("partition");
        assert_eq!(first, again);
        assert!(first < 7);

        let decoded = codec.keys.decode(&bytes).expect("decode");
        let by_object = codec
            .partitioner
            .try_partition_key(&decoded, 7)
            .expect("partition key");
        assert_eq!(first, by_object);
    }
}

#[test]
fn equal_groups_share_a_partition() {
    let codec = codec();
    let a = key(&codec, 42, Some(1));
    let b = key(&codec, 42, Some(1_000));
    for n in [1, 2, 5, 16] {
        assert_eq!(
            codec.partitioner.try_partition(&a, n).expect("a"),
            codec.partitioner.try_partition(&b, n).expect("b")
        );
    }
}

#[test]
fn zero_partitions_is_rejected() {
    let codec = codec();
    let bytes = key(&codec, 1, Some(1));
    assert!(matches!(
        codec.partitioner.try_partition(&bytes, 0),
        Err(ShuffleError::Partitions(0))
    ));
}

#[test]
fn sort_comparator_is_antisymmetric_and_matches_objects() {
    let codec = codec();
    let keys = samples(&codec);
    for a in &keys {
        for b in &keys {
            let ab = codec.sort.try_compare_bytes(a, b).expect("a,b");
            let ba = codec.sort.try_compare_bytes(b, a).expect("b,a");
            assert_eq!(ab, ba.reverse());

            let ka = codec.keys.decode(a).expect("decode a");
            let kb = codec.keys.decode(b).expect("decode b");
            assert_eq!(ab, codec.sort.try_compare(&ka, &kb).expect("objects"));
            assert_eq!(
                codec.grouping.try_compare_bytes(a, b).expect("group bytes"),
                codec.grouping.try_compare(&ka, &kb).expect("group objects")
            );
        }
    }
}

#[test]
fn descending_term_reverses_order() {
    let codec = codec();
    let small = key(&codec, 1, Some(5));
    let large = key(&codec, 1, Some(10));

    assert_eq!(
        codec.sort.try_compare_bytes(&large, &small).expect("compare"),
        Ordering::Less
    );
    // grouping ignores sort terms
    assert_eq!(
        codec.grouping.try_compare_bytes(&large, &small).expect("group"),
        Ordering::Equal
    );
    // grouping terms still ascend
    let next_store = key(&codec, 2, Some(99));
    assert_eq!(
        codec.sort.try_compare_bytes(&small, &next_store).expect("compare"),
        Ordering::Less
    );
}

#[test]
fn decode_inverts_encode() {
    let codec = codec();
    let record = common::record(vec![Scalar::I32(9), Scalar::Null]);
    let original = codec.keys.key_of(PortId::new(0), &record).expect("key");
    let bytes = codec.keys.encode(&original).expect("encode");

    assert_eq!(&bytes[..4], &0i32.to_be_bytes());
    assert_eq!(codec.keys.decode(&bytes).expect("decode"), original);
}

#[test]
fn malformed_keys_are_rejected() {
    let codec = codec();
    let bytes = key(&codec, 1, Some(1));

    assert!(codec.keys.decode(&bytes[..bytes.len() - 1]).is_err());

    let mut trailing = bytes.clone();
    trailing.push(0);
    assert!(codec.keys.decode(&trailing).is_err());

    let mut unknown = bytes.clone();
    unknown[..4].copy_from_slice(&9i32.to_be_bytes());
    assert!(codec.sort.try_compare_bytes(&unknown, &bytes).is_err());
    assert!(codec.partitioner.try_partition(&unknown, 4).is_err());
}

#[test]
fn key_extraction_checks_property_types() {
    let codec = codec();
    let wrong = common::record(vec![Scalar::Str("one".into()), Scalar::I64(1)]);
    assert!(codec.keys.key_of(PortId::new(0), &wrong).is_err());
}

fn join_codec() -> ShuffleCodec {
    common::compile(&common::sorted_join("cogroup")).1.codec
}

fn join_key(codec: &ShuffleCodec, port: u32, k: i32, v: &str) -> Vec<u8> {
    let record = common::record(vec![Scalar::I32(k), Scalar::Str(v.into())]);
    let key = codec
        .keys
        .key_of(PortId::new(port), &record)
        .expect("key extraction");
    codec.keys.encode(&key).expect("encode")
}

fn join_samples(codec: &ShuffleCodec) -> Vec<Vec<u8>> {
    let mut keys = Vec::new();
    for port in [0, 1] {
        for k in [-2, 1, 42] {
            for v in ["", "a", "ab", "b"] {
                keys.push(join_key(codec, port, k, v));
            }
        }
    }
    keys
}

#[test]
fn ports_of_one_element_share_groups_and_partitions() {
    let (_, compiled) = common::compile(&common::sorted_join("cogroup"));
    assert_eq!(
        compiled.reduce_task().expect("reduce task").ports(),
        vec![PortId::new(0), PortId::new(1)]
    );
    let codec = compiled.codec;
    assert_eq!(
        codec.keys.element_of(PortId::new(0)).expect("port 0"),
        codec.keys.element_of(PortId::new(1)).expect("port 1")
    );
    assert!(codec.keys.element_of(PortId::new(2)).is_err());

    for k in [-5, 0, 1, 42, i32::MAX] {
        let left = join_key(&codec, 0, k, "a");
        let right = join_key(&codec, 1, k, "zz");
        assert_eq!(
            codec.grouping.try_compare_bytes(&left, &right).expect("group"),
            Ordering::Equal
        );
        for n in [1, 3, 16] {
            assert_eq!(
                codec.partitioner.try_partition(&left, n).expect("left"),
                codec.partitioner.try_partition(&right, n).expect("right"),
                "key {} with {} partitions",
                k,
                n
            );
        }
    }
}

#[test]
fn comparators_agree_across_segments() {
    let codec = join_codec();
    let keys = join_samples(&codec);
    for a in &keys {
        for b in &keys {
            let ab = codec.sort.try_compare_bytes(a, b).expect("a,b");
            assert_eq!(ab, codec.sort.try_compare_bytes(b, a).expect("b,a").reverse());

            let ka = codec.keys.decode(a).expect("decode a");
            let kb = codec.keys.decode(b).expect("decode b");
            assert_eq!(ab, codec.sort.try_compare(&ka, &kb).expect("objects"));

            let group = codec.grouping.try_compare_bytes(a, b).expect("group bytes");
            assert_eq!(group, codec.grouping.try_compare(&ka, &kb).expect("group objects"));
            assert_eq!(group == Ordering::Equal, ka.terms[0] == kb.terms[0]);
        }
    }
}

#[test]
fn each_segment_keeps_its_own_direction() {
    let codec = join_codec();
    let cmp = |a: Vec<u8>, b: Vec<u8>| codec.sort.try_compare_bytes(&a, &b).expect("compare");

    // port 0 ascends, port 1 descends
    assert_eq!(cmp(join_key(&codec, 0, 1, "a"), join_key(&codec, 0, 1, "b")), Ordering::Less);
    assert_eq!(cmp(join_key(&codec, 1, 1, "a"), join_key(&codec, 1, 1, "b")), Ordering::Greater);
    // within a group every port 0 key precedes every port 1 key
    assert_eq!(cmp(join_key(&codec, 0, 1, "z"), join_key(&codec, 1, 1, "")), Ordering::Less);
    // the grouping term outranks the port tag
    assert_eq!(cmp(join_key(&codec, 1, 1, "a"), join_key(&codec, 0, 2, "a")), Ordering::Less);
}
