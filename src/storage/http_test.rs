use super::*;

fn store(part_size: usize) -> HttpObjectStore {
    HttpObjectStore::new(
        "https://store.test/".into(),
        "https://cdn.test/bucket/".into(),
        None,
        part_size,
        HttpTimeouts { request_secs: 5, connect_secs: 1 },
    )
    .unwrap()
}

#[test]
fn split_parts_chunks_with_short_tail() {
    let payload = Bytes::from_static(b"abcdefghij");
    let parts = split_parts(&payload, 4);
    assert_eq!(parts.len(), 3);
    assert_eq!(&parts[0][..], b"abcd");
    assert_eq!(&parts[1][..], b"efgh");
    assert_eq!(&parts[2][..], b"ij");
}

#[test]
fn split_parts_exact_multiple() {
    let payload = Bytes::from_static(b"abcdef");
    let parts = split_parts(&payload, 3);
    assert_eq!(parts.len(), 2);
}

#[test]
fn split_parts_empty_payload_is_single_part() {
    let parts = split_parts(&Bytes::new(), 1024);
    assert_eq!(parts.len(), 1);
    assert!(parts[0].is_empty());
}

#[test]
fn fraction_sent_handles_zero_total() {
    assert!((fraction_sent(0, 0) - 1.0).abs() < f64::EPSILON);
    assert!((fraction_sent(5, 10) - 0.5).abs() < f64::EPSILON);
}

#[test]
fn parse_initiate_reads_upload_id() {
    assert_eq!(parse_initiate(r#"{"upload_id":"u-1"}"#).unwrap(), "u-1");
    assert!(matches!(parse_initiate("{}").unwrap_err(), StorageError::Parse(_)));
}

#[test]
fn public_url_joins_base_and_path() {
    let store = store(1024);
    assert_eq!(store.public_url("documents/abc.pptx"), "https://cdn.test/bucket/documents/abc.pptx");
    assert_eq!(store.public_url("/abc.png"), "https://cdn.test/bucket/abc.png");
}

#[test]
fn zero_part_size_is_raised_to_one() {
    let store = store(0);
    assert_eq!(store.part_size, 1);
    assert_eq!(store.endpoint, "https://store.test");
}
