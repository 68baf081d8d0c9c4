// Chatroom Ingest Service
// Polls the feed and appends new records without starting the bot
// Run with: cargo run --bin ingest

use dotenv::dotenv;
use tracing::{info, warn};

use chatvault::{config::Config, poller::Poller, store::RecordStore};

#[tokio::main]
async fn main() {
    dotenv().ok();
    tracing_subscriber::fmt::init();

    let cfg = Config::from_env();

    info!("Starting Chatroom Ingest Service...");

    let store = RecordStore::new(&cfg.data_file);
    let mut poller = Poller::new(&cfg, store);
    if let Err(err) = poller.seed_from_store() {
        warn!(error = %err, "could not seed dedup set from store; starting empty");
    }

    poller.run().await;
}
