use chrono::{DateTime, Duration, NaiveDateTime};
use thiserror::Error;

use crate::schema::ChatRecord;
use crate::store::{RecordStore, StoreError};

/// Operators supply wall-clock times in the chatroom's local zone (WIB,
/// UTC+7); the store always holds UTC epoch seconds.
pub const LOCAL_OFFSET_HOURS: i64 = 7;

const CIVIL_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

#[derive(Debug, Error)]
pub enum QueryError {
    #[error("time must be formatted as YYYY-MM-DD HH:MM:SS: {0}")]
    Format(#[from] chrono::ParseError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Parses a local civil timestamp and converts it to UTC epoch seconds.
pub fn local_to_utc_epoch(value: &str) -> Result<i64, chrono::ParseError> {
    let naive = NaiveDateTime::parse_from_str(value.trim(), CIVIL_FORMAT)?;
    Ok((naive - Duration::hours(LOCAL_OFFSET_HOURS))
        .and_utc()
        .timestamp())
}

/// Renders UTC epoch seconds as a local civil timestamp. An epoch outside
/// chrono's representable range renders empty rather than panicking.
pub fn utc_epoch_to_local_string(ts: i64) -> String {
    match DateTime::from_timestamp(ts, 0) {
        Some(utc) => (utc + Duration::hours(LOCAL_OFFSET_HOURS))
            .format(CIVIL_FORMAT)
            .to_string(),
        None => String::new(),
    }
}

/// Scans the store once and returns, in file order, every record whose
/// timestamp falls inside the inclusive local-time range and whose author
/// matches the optional case-insensitive filter. Zero matches is an empty
/// Ok, not an error.
pub fn search(
    store: &RecordStore,
    start_local: &str,
    end_local: &str,
    username: Option<&str>,
) -> Result<Vec<ChatRecord>, QueryError> {
    let start_utc = local_to_utc_epoch(start_local)?;
    let end_utc = local_to_utc_epoch(end_local)?;
    let wanted = username.map(str::to_lowercase);

    let mut matches = Vec::new();
    for record in store.scan()? {
        let Some(ts) = record.timestamp else {
            continue;
        };
        if ts < start_utc || ts > end_utc {
            continue;
        }
        if let Some(wanted) = &wanted {
            let stored = record.username.as_deref().unwrap_or("");
            if stored.to_lowercase() != *wanted {
                continue;
            }
        }
        matches.push(record);
    }
    Ok(matches)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::RecordId;
    use serde_json::Map;
    use std::io::Write;

    // 2025-08-15 00:00:00 UTC, i.e. 07:00:00 in the chatroom's local zone.
    const MIDNIGHT_UTC: i64 = 1755216000;

    fn record(id: i64, timestamp: Option<i64>, username: &str) -> ChatRecord {
        ChatRecord {
            id: RecordId::Num(id),
            timestamp,
            username: Some(username.to_string()),
            content: "halo".into(),
            extra: Map::new(),
        }
    }

    fn seeded_store(dir: &tempfile::TempDir, records: &[ChatRecord]) -> RecordStore {
        let store = RecordStore::new(dir.path().join("chatroom_history.jsonl"));
        store.append(records).unwrap();
        store
    }

    #[test]
    fn civil_time_converts_across_the_offset() {
        assert_eq!(
            local_to_utc_epoch("2025-08-15 07:00:00").unwrap(),
            MIDNIGHT_UTC
        );
        assert_eq!(
            utc_epoch_to_local_string(MIDNIGHT_UTC),
            "2025-08-15 07:00:00"
        );
    }

    #[test]
    fn range_bounds_are_inclusive_in_local_time() {
        let dir = tempfile::tempdir().unwrap();
        let store = seeded_store(&dir, &[record(1, Some(MIDNIGHT_UTC), "budi")]);

        let hit = search(&store, "2025-08-15 07:00:00", "2025-08-15 08:00:00", None).unwrap();
        assert_eq!(hit.len(), 1);

        let miss = search(&store, "2025-08-15 08:00:01", "2025-08-15 09:00:00", None).unwrap();
        assert!(miss.is_empty());
    }

    #[test]
    fn username_filter_ignores_case() {
        let dir = tempfile::tempdir().unwrap();
        let store = seeded_store(
            &dir,
            &[
                record(1, Some(MIDNIGHT_UTC), "AhmadKholiln75"),
                record(2, Some(MIDNIGHT_UTC), "someone_else"),
            ],
        );

        let matches = search(
            &store,
            "2025-08-15 07:00:00",
            "2025-08-15 08:00:00",
            Some("ahmadkholiln75"),
        )
        .unwrap();
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].id, RecordId::Num(1));
    }

    #[test]
    fn empty_range_is_ok_not_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let store = seeded_store(&dir, &[record(1, Some(MIDNIGHT_UTC), "budi")]);

        let matches = search(&store, "2024-01-01 00:00:00", "2024-01-02 00:00:00", None).unwrap();
        assert!(matches.is_empty());
    }

    #[test]
    fn unparseable_range_is_a_format_error() {
        let dir = tempfile::tempdir().unwrap();
        let store = RecordStore::new(dir.path().join("chatroom_history.jsonl"));

        let err = search(&store, "15-08-2025 07:00", "2025-08-15 08:00:00", None).unwrap_err();
        assert!(matches!(err, QueryError::Format(_)));
    }

    #[test]
    fn records_without_timestamps_never_match() {
        let dir = tempfile::tempdir().unwrap();
        let store = seeded_store(
            &dir,
            &[
                record(1, None, "budi"),
                record(2, Some(MIDNIGHT_UTC), "budi"),
            ],
        );

        let matches = search(&store, "2025-08-15 07:00:00", "2025-08-15 08:00:00", None).unwrap();
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].id, RecordId::Num(2));
    }

    #[test]
    fn corrupt_line_costs_only_itself() {
        let dir = tempfile::tempdir().unwrap();
        let mut records = Vec::new();
        for i in 0..10 {
            records.push(record(i, Some(MIDNIGHT_UTC + i), "budi"));
        }
        let store = seeded_store(&dir, &records[..5]);
        std::fs::OpenOptions::new()
            .append(true)
            .open(store.path())
            .unwrap()
            .write_all(b"{\"id\":oops}\n")
            .unwrap();
        store.append(&records[5..]).unwrap();

        let matches = search(&store, "2025-08-15 07:00:00", "2025-08-15 08:00:00", None).unwrap();
        assert_eq!(matches.len(), 10);
    }
}
