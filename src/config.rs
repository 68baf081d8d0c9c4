use std::env;

#[derive(Debug, Clone)]
pub struct Config {
    pub discord_token: String,
    pub guild_id: u64,
    pub feed_url: String,
    pub feed_page_limit: u32,
    pub data_file: String,
    pub poll_interval_secs: u64,
}

impl Config {
    pub fn from_env() -> Self {
        Self {
            discord_token: env::var("DISCORD_TOKEN").expect("Expected DISCORD_TOKEN in env"),
            guild_id: env::var("GUILD_ID")
                .expect("Expected GUILD_ID in env")
                .parse()
                .expect("GUILD_ID must be a numeric Discord guild id"),
            feed_url: env::var("FEED_URL")
                .unwrap_or_else(|_| "https://indodax.com/api/v2/chatroom/history".into()),
            feed_page_limit: env::var("FEED_PAGE_LIMIT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(50),
            data_file: env::var("DATA_FILE").unwrap_or_else(|_| "chatroom_history.jsonl".into()),
            poll_interval_secs: env::var("POLL_INTERVAL_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(1),
        }
    }
}
