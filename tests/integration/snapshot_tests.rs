//! Snapshot persistence and reservation reconciliation tests

use crate::common::png_bytes;
use kobo_harvest::images::codec;
use kobo_harvest::storage::{load_snapshot, save_snapshot, JsonSnapshotStore, SnapshotStore};
use kobo_harvest::{CoverImage, ImageValidator, Period, Record, ReservationEntry};
use std::fs;
use tempfile::TempDir;

fn period() -> Period {
    Period::new(2025, 7).unwrap()
}

fn records() -> Vec<Record> {
    let cover = codec::encode(&codec::decode(&png_bytes(12, 16)).unwrap(), 85).unwrap();
    vec![
        Record {
            release_date: "2025/07/01".to_string(),
            title: "作品A 1巻".to_string(),
            author: "著者A".to_string(),
            price: "660円".to_string(),
            source_link: "https://books.example.com/rk/a/".to_string(),
            image_link: "https://thumbnail.example.com/a.jpg".to_string(),
            cover: Some(CoverImage::from_encoded(cover)),
            image_validator: ImageValidator {
                etag: Some("\"abc\"".to_string()),
                last_modified: Some("Tue, 01 Jul 2025 00:00:00 GMT".to_string()),
            },
            reserved: true,
        },
        Record {
            release_date: "2025/07/15".to_string(),
            title: "作品B 完全版".to_string(),
            author: String::new(),
            price: "1,980円".to_string(),
            source_link: "https://books.example.com/rk/b/".to_string(),
            image_link: String::new(),
            cover: None,
            image_validator: ImageValidator::default(),
            reserved: false,
        },
    ]
}

#[test]
fn test_load_then_save_is_byte_identical() {
    let temp = TempDir::new().unwrap();
    let store = JsonSnapshotStore::new(temp.path());
    save_snapshot(&store, period(), &records()).unwrap();

    let records_path = store.records_path(period());
    let reservations_path = store.reservations_path(period());
    let records_before = fs::read(&records_path).unwrap();
    let reservations_before = fs::read(&reservations_path).unwrap();

    let loaded = load_snapshot(&store, period()).unwrap().unwrap();
    save_snapshot(&store, period(), &loaded).unwrap();

    assert_eq!(fs::read(&records_path).unwrap(), records_before);
    assert_eq!(fs::read(&reservations_path).unwrap(), reservations_before);
}

#[test]
fn test_decoded_cover_survives_save() {
    let temp = TempDir::new().unwrap();
    let store = JsonSnapshotStore::new(temp.path());

    let mut records = records();
    records[1].cover = Some(CoverImage::from_decoded(
        codec::decode(&png_bytes(30, 40)).unwrap(),
    ));
    save_snapshot(&store, period(), &records).unwrap();

    let mut loaded = load_snapshot(&store, period()).unwrap().unwrap();
    let cover = loaded[1].cover.as_mut().unwrap();
    assert!(cover.encoded().unwrap().starts_with(codec::DATA_URI_PREFIX));
    assert_eq!(cover.dimensions().unwrap(), (30, 40));
}

#[test]
fn test_reservation_requires_exact_title_and_date() {
    let temp = TempDir::new().unwrap();
    let store = JsonSnapshotStore::new(temp.path());

    let mut records = records();
    records[0].reserved = false;
    store.save_records(period(), &records).unwrap();
    store
        .save_reservations(
            period(),
            &[
                // same title, other date
                ReservationEntry {
                    release_date: "2025/07/02".to_string(),
                    title: "作品A 1巻".to_string(),
                },
                // same date, title differs in whitespace
                ReservationEntry {
                    release_date: "2025/07/15".to_string(),
                    title: "作品B  完全版".to_string(),
                },
            ],
        )
        .unwrap();

    let loaded = load_snapshot(&store, period()).unwrap().unwrap();
    assert!(loaded.iter().all(|r| !r.reserved));

    store
        .save_reservations(
            period(),
            &[ReservationEntry {
                release_date: "2025/07/15".to_string(),
                title: "作品B 完全版".to_string(),
            }],
        )
        .unwrap();
    let loaded = load_snapshot(&store, period()).unwrap().unwrap();
    assert!(!loaded[0].reserved);
    assert!(loaded[1].reserved);
}

#[test]
fn test_snapshot_without_records_is_not_found() {
    let temp = TempDir::new().unwrap();
    let store = JsonSnapshotStore::new(temp.path());
    store.save_records(period(), &[]).unwrap();
    fs::write(store.reservations_path(period()), "not json").unwrap();

    // the reservation file is never read for an empty snapshot
    assert!(load_snapshot(&store, period()).unwrap().is_none());
}

#[test]
fn test_snapshot_written_by_hand_is_accepted() {
    let temp = TempDir::new().unwrap();
    let store = JsonSnapshotStore::new(temp.path());
    fs::write(
        store.records_path(period()),
        r#"[{"releaseDate":"2025/07/01","title":"T","imageEncoded":null,"reserved":false}]"#,
    )
    .unwrap();
    fs::write(
        store.reservations_path(period()),
        r#"[{"releaseDate":"2025/07/01","title":"T"}]"#,
    )
    .unwrap();

    let loaded = load_snapshot(&store, period()).unwrap().unwrap();
    assert_eq!(loaded.len(), 1);
    assert!(loaded[0].reserved);
    assert!(loaded[0].cover.is_none());
}
