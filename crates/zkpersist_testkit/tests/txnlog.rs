//! Log behavior observed through files on disk.

use proptest::prelude::*;
use std::fs;
use zkpersist_core::{purge, SessionTable, TxnRecord, Zxid};
use zkpersist_testkit::prelude::*;

fn quiet_dir() -> TempDataDir {
    TempDataDir::with_config(|c| c.force_sync(false))
}

proptest! {
    #![proptest_config(PropTestConfig::quick().to_proptest_config())]

    #[test]
    fn records_survive_restart(batch in record_batch_strategy(40)) {
        let dir = quiet_dir();
        let log = dir.open();
        for record in &batch {
            log.append(Some(&record.header), &record.payload).unwrap();
        }
        log.commit().unwrap();
        drop(log);

        let read: Vec<TxnRecord> = dir
            .open()
            .read(Zxid::NONE)
            .unwrap()
            .collect::<Result<_, _>>()
            .unwrap();
        prop_assert_eq!(read, batch);
    }

    #[test]
    fn reads_start_at_or_after_since(
        zxids in increasing_zxids_strategy(30),
        pick in any::<prop::sample::Index>(),
        roll_every in 1usize..8,
    ) {
        let dir = quiet_dir();
        let log = dir.open();
        for (i, &z) in zxids.iter().enumerate() {
            if i > 0 && i % roll_every == 0 {
                log.roll_log().unwrap();
            }
            log.append(Some(&header_for(z)), &payload_for(z)).unwrap();
        }
        log.commit().unwrap();

        let since = zxids[pick.index(zxids.len())];
        let read: Vec<i64> = log
            .read(Zxid::new(since))
            .unwrap()
            .map(|r| r.unwrap().zxid().as_i64())
            .collect();
        let expected: Vec<i64> = zxids.iter().copied().filter(|&z| z >= since).collect();
        prop_assert_eq!(read, expected);
    }
}

#[test]
fn truncate_drops_everything_from_target() {
    let dir = TempDataDir::new();
    let log = dir.open();
    append_zxids(&log, &[1, 2, 3]);
    log.roll_log().unwrap();
    append_zxids(&log, &[5, 9]);
    assert_eq!(dir.segment_names(), vec!["log.1".to_string(), "log.5".to_string()]);

    assert!(log.truncate_log(Zxid::new(5)).unwrap());
    assert_eq!(logged_zxids(&log), vec![1, 2, 3]);
    assert_eq!(log.last_logged_zxid().unwrap(), Zxid::new(3));
    assert_eq!(dir.segment_names(), vec!["log.1".to_string()]);

    // Logging resumes in a fresh segment.
    append_zxids(&log, &[5]);
    drop(log);
    assert_eq!(logged_zxids(&dir.open()), vec![1, 2, 3, 5]);
}

#[test]
fn truncate_inside_a_segment_keeps_earlier_records() {
    let dir = TempDataDir::new();
    let log = dir.open();
    append_zxids(&log, &[1, 2, 3, 4, 5]);

    assert!(log.truncate_log(Zxid::new(3)).unwrap());
    drop(log);
    assert_eq!(logged_zxids(&dir.open()), vec![1, 2]);
}

#[test]
fn truncate_past_end_changes_nothing() {
    let dir = TempDataDir::new();
    let log = dir.open();
    append_zxids(&log, &[1, 2]);
    assert!(!log.truncate_log(Zxid::new(10)).unwrap());
    assert_eq!(logged_zxids(&log), vec![1, 2]);
}

#[test]
fn closed_segments_are_padded_to_preallocation_chunks() {
    let dir = TempDataDir::new();
    let log = dir.open();
    let big = vec![0xAB; 3000];
    for z in 1..=4 {
        log.append(Some(&header_for(z)), &big).unwrap();
    }
    log.commit().unwrap();
    log.roll_log().unwrap();
    append_zxids(&log, &[5]);
    log.close().unwrap();

    for name in dir.segment_names() {
        let len = fs::metadata(dir.log_dir().join(&name)).unwrap().len();
        assert_eq!(len % TEST_PREALLOC, 0, "{name} is {len} bytes");
        assert!(len > 0);
    }
    assert_eq!(logged_zxids(&dir.open()).len(), 5);
}

#[test]
fn size_limit_rolls_segments() {
    let dir = TempDataDir::with_config(|c| c.log_size_limit(Some(1024)));
    let log = dir.open();
    for z in 1..=6 {
        log.append(Some(&header_for(z)), &[7u8; 400]).unwrap();
    }
    log.commit().unwrap();

    assert!(dir.segment_names().len() > 1);
    assert_eq!(logged_zxids(&log), vec![1, 2, 3, 4, 5, 6]);
}

#[test]
fn last_logged_zxid_survives_restart_with_empty_newest_segment() {
    let dir = TempDataDir::new();
    let log = dir.open();
    append_zxids(&log, &[1, 2, 3]);
    drop(log);

    // A segment holding only its header, as left by a crash right after
    // creation.
    fs::write(
        dir.log_dir().join("log.4"),
        zkpersist_core::FileHeader::log(0).encode(),
    )
    .unwrap();
    assert_eq!(dir.open().last_logged_zxid().unwrap(), Zxid::new(3));
    assert_eq!(logged_zxids(&dir.open()), vec![1, 2, 3]);
}

#[test]
fn corrupt_record_fails_the_read() {
    let dir = TempDataDir::new();
    append_zxids(&dir.open(), &[1, 2]);
    // First record body starts after the 16-byte header and 12-byte prefix.
    flip_byte(&dir.log_dir().join("log.1"), 16 + 12 + 2);

    let log = dir.open();
    let result: Result<Vec<_>, _> = log.read(Zxid::NONE).unwrap().collect();
    let err = result.unwrap_err();
    assert!(err.is_integrity(), "{err}");
}

#[test]
fn purge_keeps_what_recovery_needs() {
    let dir = TempDataDir::new();
    let log = dir.open();
    let mut state = RecordingState::new();

    for round in 0..5i64 {
        let zxids = [round * 10 + 1, round * 10 + 2];
        append_zxids(&log, &zxids);
        for z in zxids {
            zkpersist_core::DataState::apply_txn(&mut state, &header_for(z), &payload_for(z)).unwrap();
        }
        log.save(&state, &SessionTable::new(), Zxid::new(zxids[1])).unwrap();
        log.roll_log().unwrap();
    }
    log.close().unwrap();

    let report = purge(&dir.log_dir(), &dir.snap_dir(), 3).unwrap();
    assert_eq!(report.oldest_retained, Zxid::new(22));
    assert_eq!(report.removed_snapshots.len(), 2);
    assert_eq!(
        dir.snapshot_names(),
        vec!["snapshot.16".to_string(), "snapshot.20".to_string(), "snapshot.2a".to_string()]
    );
    // log.15 holds zxid 0x16, so it stays.
    assert_eq!(
        dir.segment_names(),
        vec!["log.15".to_string(), "log.1f".to_string(), "log.29".to_string()]
    );

    let mut restored = RecordingState::new();
    let mut sessions = SessionTable::new();
    let outcome = dir.open().restore(&mut restored, &mut sessions).unwrap();
    assert_eq!(outcome.snapshot_zxid, Zxid::new(42));
    assert_eq!(restored, state);
}

#[test]
fn purge_requires_three_snapshots() {
    let dir = TempDataDir::new();
    assert!(purge(&dir.log_dir(), &dir.snap_dir(), 2).is_err());
}
