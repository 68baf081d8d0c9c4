use tracing::error;

use crate::query::utc_epoch_to_local_string;
use crate::schema::ChatRecord;

/// `[local-time] author: content` per record with a trailing count, the
/// default rendering handed back to operators. Records without a usable
/// timestamp render with an empty time rather than being dropped.
pub fn render_human(records: &[ChatRecord]) -> String {
    let mut out = String::new();
    for record in records {
        let local = record
            .timestamp
            .map(utc_epoch_to_local_string)
            .unwrap_or_default();
        let username = record.username.as_deref().unwrap_or("");
        out.push_str(&format!("[{local}] {username}: {}\n", record.content));
    }
    out.push_str(&format!("\nTotal messages: {}\n", records.len()));
    out
}

/// One JSON object per line in the record's stored form, no reformatting.
/// This is the bulk-export rendering.
pub fn render_raw(records: &[ChatRecord]) -> String {
    let mut out = String::new();
    for record in records {
        match serde_json::to_string(record) {
            Ok(line) => {
                out.push_str(&line);
                out.push('\n');
            }
            Err(err) => {
                error!(id = %record.id, error = %err, "failed to serialize record for export")
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::RecordId;
    use serde_json::{Map, Value};

    fn record() -> ChatRecord {
        let mut extra = Map::new();
        extra.insert("room".into(), Value::from("btc"));
        ChatRecord {
            id: RecordId::Num(1),
            // 2025-08-15 00:00:00 UTC -> 07:00:00 local
            timestamp: Some(1755216000),
            username: Some("budi".into()),
            content: "halo semua".into(),
            extra,
        }
    }

    #[test]
    fn human_lines_use_local_time_and_count() {
        let out = render_human(&[record()]);
        assert!(out.starts_with("[2025-08-15 07:00:00] budi: halo semua\n"));
        assert!(out.ends_with("\nTotal messages: 1\n"));
    }

    #[test]
    fn human_rendering_tolerates_missing_fields() {
        let bare = ChatRecord {
            id: RecordId::Num(2),
            timestamp: None,
            username: None,
            content: "anon".into(),
            extra: Map::new(),
        };
        let out = render_human(&[bare]);
        assert!(out.starts_with("[] : anon\n"));
    }

    #[test]
    fn raw_rendering_round_trips_records() {
        let out = render_raw(&[record()]);
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines.len(), 1);

        let reparsed: ChatRecord = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(reparsed, record());
        assert_eq!(reparsed.extra["room"], Value::from("btc"));
    }
}
