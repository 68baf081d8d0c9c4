use std::collections::{HashSet, VecDeque};
use std::time::Duration;

use thiserror::Error;
use tracing::{error, info};

use crate::config::Config;
use crate::feed::{FeedClient, FeedError};
use crate::metrics::{POLL_CYCLES, POLL_FAILURES, RECORDS_APPENDED, TRACKED_IDS};
use crate::schema::{ChatRecord, RecordId};
use crate::store::{RecordStore, StoreError};

/// Upper bound on remembered ids, far above the feed's page size so every
/// id still inside the rolling window stays covered.
const MAX_TRACKED_IDS: usize = 10_000;

#[derive(Debug, Error)]
pub enum PollError {
    #[error(transparent)]
    Feed(#[from] FeedError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Keeps the record store in sync with the feed's rolling window of recent
/// messages. Single writer to the store; queries only ever read.
pub struct Poller {
    feed: FeedClient,
    store: RecordStore,
    shown_ids: HashSet<RecordId>,
    seen_order: VecDeque<RecordId>,
    interval: Duration,
}

impl Poller {
    pub fn new(cfg: &Config, store: RecordStore) -> Self {
        Self {
            feed: FeedClient::new(cfg),
            store,
            shown_ids: HashSet::new(),
            seen_order: VecDeque::new(),
            interval: Duration::from_secs(cfg.poll_interval_secs),
        }
    }

    /// Replays ids already on disk so a restart does not re-append records
    /// the feed window still shows.
    pub fn seed_from_store(&mut self) -> Result<usize, StoreError> {
        let mut seeded = 0;
        for record in self.store.scan()? {
            if self.mark_seen(record.id) {
                seeded += 1;
            }
        }
        info!(count = seeded, "seeded dedup set from existing store");
        Ok(seeded)
    }

    fn mark_seen(&mut self, id: RecordId) -> bool {
        if !self.shown_ids.insert(id.clone()) {
            return false;
        }
        self.seen_order.push_back(id);
        while self.seen_order.len() > MAX_TRACKED_IDS {
            if let Some(oldest) = self.seen_order.pop_front() {
                self.shown_ids.remove(&oldest);
            }
        }
        TRACKED_IDS.set(self.shown_ids.len() as f64);
        true
    }

    /// Reverses the newest-first page to chronological order and keeps only
    /// records whose id has not been seen, marking them seen.
    fn filter_new(&mut self, page: Vec<ChatRecord>) -> Vec<ChatRecord> {
        let mut fresh = Vec::new();
        for record in page.into_iter().rev() {
            if self.mark_seen(record.id.clone()) {
                fresh.push(record);
            }
        }
        fresh
    }

    /// One fetch-dedup-append pass; returns how many records were appended.
    pub async fn cycle(&mut self) -> Result<usize, PollError> {
        let page = self.feed.fetch_recent().await?;
        let fresh = self.filter_new(page);
        if fresh.is_empty() {
            return Ok(0);
        }
        self.store.append(&fresh)?;
        RECORDS_APPENDED.inc_by(fresh.len() as f64);
        Ok(fresh.len())
    }

    /// Runs until process shutdown. Every failure is logged and the loop
    /// continues after the normal interval; there is no backoff escalation.
    pub async fn run(mut self) {
        info!(
            interval_secs = self.interval.as_secs(),
            "chatroom polling started"
        );
        loop {
            POLL_CYCLES.inc();
            match self.cycle().await {
                Ok(0) => {}
                Ok(count) => info!(count = count, "appended new chat records"),
                Err(err) => {
                    POLL_FAILURES.inc();
                    error!(error = %err, "poll cycle failed");
                }
            }
            tokio::time::sleep(self.interval).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Map;

    fn test_cfg(dir: &tempfile::TempDir) -> Config {
        Config {
            discord_token: String::new(),
            guild_id: 0,
            feed_url: "http://localhost/history".into(),
            feed_page_limit: 50,
            data_file: dir
                .path()
                .join("chatroom_history.jsonl")
                .display()
                .to_string(),
            poll_interval_secs: 1,
        }
    }

    fn record(id: i64) -> ChatRecord {
        ChatRecord {
            id: RecordId::Num(id),
            timestamp: Some(id * 10),
            username: Some("a".into()),
            content: "x".into(),
            extra: Map::new(),
        }
    }

    fn poller(dir: &tempfile::TempDir) -> Poller {
        let cfg = test_cfg(dir);
        let store = RecordStore::new(&cfg.data_file);
        Poller::new(&cfg, store)
    }

    #[test]
    fn page_is_appended_oldest_first() {
        let dir = tempfile::tempdir().unwrap();
        let mut poller = poller(&dir);

        let fresh = poller.filter_new(vec![record(5), record(4), record(3)]);
        let ids: Vec<RecordId> = fresh.iter().map(|r| r.id.clone()).collect();
        assert_eq!(
            ids,
            vec![RecordId::Num(3), RecordId::Num(4), RecordId::Num(5)]
        );
    }

    #[test]
    fn overlapping_pages_append_each_id_once() {
        let dir = tempfile::tempdir().unwrap();
        let mut poller = poller(&dir);
        let store = RecordStore::new(dir.path().join("chatroom_history.jsonl"));

        for page in [
            vec![record(5), record(4), record(3)],
            vec![record(6), record(5), record(4)],
            vec![record(7), record(6), record(5)],
        ] {
            let fresh = poller.filter_new(page);
            store.append(&fresh).unwrap();
        }

        let ids: Vec<RecordId> = store.scan().unwrap().map(|r| r.id).collect();
        assert_eq!(ids, (3..=7).map(RecordId::Num).collect::<Vec<_>>());
    }

    #[test]
    fn seeding_skips_ids_already_stored() {
        let dir = tempfile::tempdir().unwrap();
        let store = RecordStore::new(dir.path().join("chatroom_history.jsonl"));
        store.append(&[record(3), record(4)]).unwrap();

        let mut poller = poller(&dir);
        assert_eq!(poller.seed_from_store().unwrap(), 2);

        let fresh = poller.filter_new(vec![record(5), record(4), record(3)]);
        let ids: Vec<RecordId> = fresh.iter().map(|r| r.id.clone()).collect();
        assert_eq!(ids, vec![RecordId::Num(5)]);
    }

    #[test]
    fn dedup_set_stays_bounded() {
        let dir = tempfile::tempdir().unwrap();
        let mut poller = poller(&dir);

        for i in 0..(MAX_TRACKED_IDS as i64 + 500) {
            poller.mark_seen(RecordId::Num(i));
        }
        assert_eq!(poller.shown_ids.len(), MAX_TRACKED_IDS);
        assert_eq!(poller.seen_order.len(), MAX_TRACKED_IDS);
        // Oldest ids were evicted, newest are still tracked.
        assert!(!poller.shown_ids.contains(&RecordId::Num(0)));
        assert!(poller
            .shown_ids
            .contains(&RecordId::Num(MAX_TRACKED_IDS as i64 + 499)));
    }
}
