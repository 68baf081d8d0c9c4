use reqwest::Client;
use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

use crate::config::Config;
use crate::schema::ChatRecord;

#[derive(Debug, Error)]
pub enum FeedError {
    #[error("feed transport: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("feed response malformed: {0}")]
    Malformed(String),
}

/// Envelope the chatroom history endpoint wraps its page in. Records are
/// returned newest-first.
#[derive(Debug, Deserialize)]
struct FeedResponse {
    #[serde(default)]
    success: bool,
    data: Option<FeedData>,
}

#[derive(Debug, Deserialize)]
struct FeedData {
    content: Option<Vec<ChatRecord>>,
}

pub struct FeedClient {
    client: Client,
    url: String,
    page_limit: u32,
}

impl FeedClient {
    pub fn new(cfg: &Config) -> Self {
        Self {
            client: Client::new(),
            url: cfg.feed_url.clone(),
            page_limit: cfg.feed_page_limit,
        }
    }

    /// Fetches the feed's most recent page, newest-first.
    pub async fn fetch_recent(&self) -> Result<Vec<ChatRecord>, FeedError> {
        let res = self
            .client
            .get(&self.url)
            .query(&[
                ("limit", self.page_limit.to_string()),
                ("offset", "0".to_string()),
            ])
            .send()
            .await?
            .error_for_status()?;

        let body = res.text().await?;
        debug!(bytes = body.len(), "fetched feed page");
        parse_feed_body(&body)
    }
}

/// Decodes the feed envelope. A well-formed page with no records is an empty
/// Ok; anything that does not match the expected shape is `Malformed` so the
/// caller can treat the cycle as no-data.
pub fn parse_feed_body(body: &str) -> Result<Vec<ChatRecord>, FeedError> {
    let response: FeedResponse =
        serde_json::from_str(body).map_err(|err| FeedError::Malformed(err.to_string()))?;

    if !response.success {
        return Err(FeedError::Malformed("feed reported failure".to_string()));
    }
    match response.data.and_then(|data| data.content) {
        Some(records) => Ok(records),
        None => Err(FeedError::Malformed(
            "feed response missing data.content".to_string(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::RecordId;

    #[test]
    fn parses_newest_first_page() {
        let body = r#"{"success":true,"data":{"content":[
            {"id":5,"timestamp":50,"username":"c","content":"z","room":"btc"},
            {"id":4,"timestamp":40,"username":"b","content":"y","room":"btc"},
            {"id":3,"timestamp":30,"username":"a","content":"x","room":"btc"}
        ]}}"#;
        let records = parse_feed_body(body).unwrap();
        assert_eq!(records.len(), 3);
        assert_eq!(records[0].id, RecordId::Num(5));
        assert_eq!(records[2].id, RecordId::Num(3));
        assert_eq!(records[0].extra["room"], serde_json::Value::from("btc"));
    }

    #[test]
    fn empty_page_is_ok() {
        let records = parse_feed_body(r#"{"success":true,"data":{"content":[]}}"#).unwrap();
        assert!(records.is_empty());
    }

    #[test]
    fn failure_flag_is_malformed() {
        let err = parse_feed_body(r#"{"success":false,"data":{"content":[]}}"#).unwrap_err();
        assert!(matches!(err, FeedError::Malformed(_)));
    }

    #[test]
    fn unexpected_shape_is_malformed() {
        assert!(matches!(
            parse_feed_body(r#"{"success":true}"#).unwrap_err(),
            FeedError::Malformed(_)
        ));
        assert!(matches!(
            parse_feed_body("<html>busy</html>").unwrap_err(),
            FeedError::Malformed(_)
        ));
    }
}
