use serenity::{
    all::{
        CommandOptionType, CreateAttachment, CreateInteractionResponse,
        CreateInteractionResponseFollowup, CreateInteractionResponseMessage, Interaction,
    },
    async_trait,
    builder::{CreateCommand, CreateCommandOption},
    model::{gateway::Ready, id::GuildId},
    prelude::*,
};
use tracing::{error, info};
use uuid::Uuid;

use crate::{
    config::Config,
    export,
    metrics::{EXPORTS, QUERIES, QUERY_DURATION, QUERY_FAILURES},
    query::{self, QueryError},
    record_duration,
    store::{RecordStore, StoreError},
};

const HELP_TEXT: &str = "Commands:\n\
    /query start end [username] - messages in a local-time range, as a text file\n\
    /export - the full captured log as JSONL\n\
    /export_range start end - a JSONL subset for a local-time range\n\
    /reset - destroy the captured log\n\
    Times are YYYY-MM-DD HH:MM:SS in UTC+7, e.g. 2025-08-15 10:00:00.\n\
    Note: the feed only exposes recent history, so older ranges may be empty.";

pub struct Handler {
    pub cfg: Config,
    pub store: RecordStore,
}

#[async_trait]
impl EventHandler for Handler {
    async fn ready(&self, ctx: Context, ready: Ready) {
        info!("{} is connected!", ready.user.name);

        let guild_id = GuildId::new(self.cfg.guild_id);

        let time_option = |name: &str, description: &str| {
            CreateCommandOption::new(CommandOptionType::String, name.to_string(), description)
                .required(true)
        };

        let commands = vec![
            CreateCommand::new("help").description("How to search the captured chatroom log"),
            CreateCommand::new("query")
                .description("Fetch messages in a local-time range")
                .add_option(time_option("start", "Start time (YYYY-MM-DD HH:MM:SS, UTC+7)"))
                .add_option(time_option("end", "End time (YYYY-MM-DD HH:MM:SS, UTC+7)"))
                .add_option(CreateCommandOption::new(
                    CommandOptionType::String,
                    "username",
                    "Only messages by this author",
                )),
            CreateCommand::new("export").description("Download the full captured log as JSONL"),
            CreateCommand::new("export_range")
                .description("Download a JSONL subset for a local-time range")
                .add_option(time_option("start", "Start time (YYYY-MM-DD HH:MM:SS, UTC+7)"))
                .add_option(time_option("end", "End time (YYYY-MM-DD HH:MM:SS, UTC+7)")),
            CreateCommand::new("reset").description("Destroy the captured log"),
        ];

        match guild_id.set_commands(&ctx.http, commands).await {
            Ok(registered) => info!(count = registered.len(), "Slash commands registered."),
            Err(err) => error!("Failed to register slash commands: {err:?}"),
        }
    }

    async fn interaction_create(&self, ctx: Context, interaction: Interaction) {
        if let Interaction::Command(command) = interaction {
            let option = |name: &str| {
                command
                    .data
                    .options
                    .iter()
                    .find(|opt| opt.name == name)
                    .and_then(|opt| opt.value.as_str())
                    .map(|value| value.to_string())
            };

            match command.data.name.as_str() {
                "help" => {
                    let resp = CreateInteractionResponse::Message(
                        CreateInteractionResponseMessage::new().content(HELP_TEXT),
                    );
                    if let Err(err) = command.create_response(&ctx.http, resp).await {
                        error!("Cannot respond to /help: {err:?}");
                    }
                }
                "query" => {
                    let (Some(start), Some(end)) = (option("start"), option("end")) else {
                        return;
                    };
                    let username = option("username");

                    let initial_resp = CreateInteractionResponse::Message(
                        CreateInteractionResponseMessage::new().content("Scanning chat history..."),
                    );
                    if let Err(err) = command.create_response(&ctx.http, initial_resp).await {
                        error!("Cannot send initial response: {err:?}");
                        return;
                    }

                    let followup = match self.handle_query(&start, &end, username.as_deref()) {
                        Ok(Some((filename, body))) => CreateInteractionResponseFollowup::new()
                            .content(format!("Messages from {start} to {end} (UTC+7):"))
                            .add_file(CreateAttachment::bytes(body, filename)),
                        Ok(None) => CreateInteractionResponseFollowup::new()
                            .content("No messages in that time range."),
                        Err(QueryError::Format(err)) => {
                            QUERY_FAILURES.inc();
                            CreateInteractionResponseFollowup::new().content(format!(
                                "Could not parse the time range ({err}). {HELP_TEXT}"
                            ))
                        }
                        Err(err) => {
                            QUERY_FAILURES.inc();
                            error!("Failed to process /query: {err}");
                            CreateInteractionResponseFollowup::new()
                                .content("Sorry, the chat log could not be read.")
                        }
                    };
                    if let Err(err) = command.create_followup(&ctx.http, followup).await {
                        error!("Cannot send followup response: {err:?}");
                    }
                }
                "export" => {
                    let initial_resp = CreateInteractionResponse::Message(
                        CreateInteractionResponseMessage::new().content("Collecting the log..."),
                    );
                    if let Err(err) = command.create_response(&ctx.http, initial_resp).await {
                        error!("Cannot send initial response: {err:?}");
                        return;
                    }

                    let followup = match self.handle_export_all() {
                        Ok(Some((filename, body))) => CreateInteractionResponseFollowup::new()
                            .content("Full captured log:")
                            .add_file(CreateAttachment::bytes(body, filename)),
                        Ok(None) => CreateInteractionResponseFollowup::new()
                            .content("No chat data has been captured yet."),
                        Err(err) => {
                            error!("Failed to process /export: {err}");
                            CreateInteractionResponseFollowup::new()
                                .content("Sorry, the chat log could not be read.")
                        }
                    };
                    if let Err(err) = command.create_followup(&ctx.http, followup).await {
                        error!("Cannot send followup response: {err:?}");
                    }
                }
                "export_range" => {
                    let (Some(start), Some(end)) = (option("start"), option("end")) else {
                        return;
                    };

                    let initial_resp = CreateInteractionResponse::Message(
                        CreateInteractionResponseMessage::new().content("Scanning chat history..."),
                    );
                    if let Err(err) = command.create_response(&ctx.http, initial_resp).await {
                        error!("Cannot send initial response: {err:?}");
                        return;
                    }

                    let followup = match self.handle_export_range(&start, &end) {
                        Ok(Some((filename, body))) => CreateInteractionResponseFollowup::new()
                            .content(format!("Raw records from {start} to {end} (UTC+7):"))
                            .add_file(CreateAttachment::bytes(body, filename)),
                        Ok(None) => CreateInteractionResponseFollowup::new()
                            .content("No messages in that time range."),
                        Err(QueryError::Format(err)) => {
                            QUERY_FAILURES.inc();
                            CreateInteractionResponseFollowup::new().content(format!(
                                "Could not parse the time range ({err}). {HELP_TEXT}"
                            ))
                        }
                        Err(err) => {
                            QUERY_FAILURES.inc();
                            error!("Failed to process /export_range: {err}");
                            CreateInteractionResponseFollowup::new()
                                .content("Sorry, the chat log could not be read.")
                        }
                    };
                    if let Err(err) = command.create_followup(&ctx.http, followup).await {
                        error!("Cannot send followup response: {err:?}");
                    }
                }
                "reset" => {
                    let content = match self.handle_reset() {
                        Ok(true) => "Captured log deleted.".to_string(),
                        Ok(false) => "Captured log was already empty.".to_string(),
                        Err(err) => {
                            error!("Failed to process /reset: {err}");
                            format!("Could not delete the log: {err}")
                        }
                    };
                    let resp = CreateInteractionResponse::Message(
                        CreateInteractionResponseMessage::new().content(content),
                    );
                    if let Err(err) = command.create_response(&ctx.http, resp).await {
                        error!("Cannot respond to /reset: {err:?}");
                    }
                }
                _ => {}
            }
        }
    }
}

impl Handler {
    fn handle_query(
        &self,
        start: &str,
        end: &str,
        username: Option<&str>,
    ) -> Result<Option<(String, Vec<u8>)>, QueryError> {
        QUERIES.inc();
        let matches = record_duration!(QUERY_DURATION, {
            query::search(&self.store, start, end, username)?
        });
        info!(count = matches.len(), "time-range query served");

        if matches.is_empty() {
            return Ok(None);
        }
        let filename = username
            .map(sanitize_filename)
            .filter(|name| !name.is_empty())
            .map(|name| format!("messages_{name}.txt"))
            .unwrap_or_else(|| format!("messages_{}.txt", Uuid::new_v4()));
        EXPORTS.inc();
        Ok(Some((filename, export::render_human(&matches).into_bytes())))
    }

    fn handle_export_all(&self) -> Result<Option<(String, Vec<u8>)>, StoreError> {
        let contents = self.store.raw_contents()?;
        if contents.is_empty() {
            return Ok(None);
        }
        let filename = self
            .store
            .path()
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or("chatroom_history.jsonl")
            .to_string();
        EXPORTS.inc();
        Ok(Some((filename, contents.into_bytes())))
    }

    fn handle_export_range(
        &self,
        start: &str,
        end: &str,
    ) -> Result<Option<(String, Vec<u8>)>, QueryError> {
        QUERIES.inc();
        let matches = record_duration!(QUERY_DURATION, {
            query::search(&self.store, start, end, None)?
        });
        if matches.is_empty() {
            return Ok(None);
        }
        EXPORTS.inc();
        Ok(Some((
            format!("export_{}.jsonl", Uuid::new_v4()),
            export::render_raw(&matches).into_bytes(),
        )))
    }

    fn handle_reset(&self) -> Result<bool, StoreError> {
        let existed = self.store.exists();
        self.store.reset()?;
        info!(existed = existed, "record store reset");
        Ok(existed)
    }
}

/// Keeps attachment names to characters Discord and every filesystem accept.
fn sanitize_filename(name: &str) -> String {
    name.chars()
        .filter(|c| c.is_alphanumeric() || matches!(c, '_' | '-'))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filenames_drop_unsafe_characters() {
        assert_eq!(sanitize_filename("AhmadKholiln75"), "AhmadKholiln75");
        assert_eq!(sanitize_filename("../etc/passwd"), "etcpasswd");
        assert_eq!(sanitize_filename("a b_c-d"), "ab_c-d");
        assert_eq!(sanitize_filename("!!!"), "");
    }
}
