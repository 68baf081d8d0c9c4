use dotenv::dotenv;
use serenity::prelude::*;
use serenity::Client as DiscordClient;
use tracing::{error, info, warn};

use chatvault::{config::Config, handler::Handler, poller::Poller, store::RecordStore};

#[tokio::main]
async fn main() {
    dotenv().ok();
    tracing_subscriber::fmt::init();

    let cfg = Config::from_env();
    let store = RecordStore::new(&cfg.data_file);

    let mut poller = Poller::new(&cfg, store.clone());
    if let Err(err) = poller.seed_from_store() {
        warn!(error = %err, "could not seed dedup set from store; starting empty");
    }
    tokio::spawn(poller.run());
    info!("Poller task started.");

    let intents = GatewayIntents::non_privileged();

    let mut client = DiscordClient::builder(&cfg.discord_token, intents)
        .event_handler(Handler {
            cfg: cfg.clone(),
            store,
        })
        .await
        .expect("Error creating Discord client");

    if let Err(err) = client.start().await {
        error!("Client error: {err:?}");
    }
}
