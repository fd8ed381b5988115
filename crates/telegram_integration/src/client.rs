use std::{fmt, time::Duration};

use async_trait::async_trait;
use gate_api::{MembershipOracle, MessageSink, SinkError};
use reqwest::Client;
use serde::{de::DeserializeOwned, Serialize};
use shared::{
    domain::{ChannelRef, ChatId, MembershipStatus, MessageId, MessageRef, UserId},
    error::OracleError,
    protocol::{Control, ControlAction},
};
use thiserror::Error;
use tracing::debug;
use url::Url;

use crate::types::{
    AnswerCallbackQueryParams, ApiResponse, ChatMember, DeleteMessageParams,
    EditMessageTextParams, GetChatMemberParams, GetUpdatesParams, InlineKeyboardButton,
    InlineKeyboardMarkup, Message, SendMessageParams, Update, User,
};

pub const DEFAULT_API_URL: &str = "https://api.telegram.org";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);
/// Slack on top of the long-poll timeout before the HTTP request itself gives up.
const POLL_GRACE: Duration = Duration::from_secs(10);
const ALLOWED_UPDATES: &[&str] = &["message", "callback_query"];
const NOT_MODIFIED: &str = "message is not modified";

#[derive(Debug, Error)]
pub enum TelegramError {
    #[error("invalid Bot API url '{url}': {source}")]
    InvalidUrl {
        url: String,
        source: url::ParseError,
    },
    #[error("Bot API request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Bot API error {code}: {description}")]
    Api {
        code: i64,
        description: String,
        retry_after: Option<u64>,
    },
    #[error("unexpected Bot API response: {0}")]
    Decode(String),
}

impl TelegramError {
    /// Flood-control delay requested by the Bot API, if any.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            TelegramError::Api {
                retry_after: Some(secs),
                ..
            } => Some(Duration::from_secs(*secs)),
            _ => None,
        }
    }

    pub fn is_not_modified(&self) -> bool {
        matches!(self, TelegramError::Api { description, .. } if description.contains(NOT_MODIFIED))
    }
}

#[derive(Clone)]
pub struct TelegramClient {
    http: Client,
    /// `<api url>/bot<token>`; never logged.
    endpoint: String,
}

impl fmt::Debug for TelegramClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TelegramClient").finish_non_exhaustive()
    }
}

impl TelegramClient {
    pub fn new(api_url: &str, token: &str) -> Result<Self, TelegramError> {
        let base = Url::parse(api_url).map_err(|source| TelegramError::InvalidUrl {
            url: api_url.to_string(),
            source,
        })?;
        let http = Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self {
            http,
            endpoint: format!("{}/bot{token}", base.as_str().trim_end_matches('/')),
        })
    }

    async fn call<P, R>(
        &self,
        method: &str,
        params: &P,
        timeout: Option<Duration>,
    ) -> Result<R, TelegramError>
    where
        P: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        let mut request = self
            .http
            .post(format!("{}/{method}", self.endpoint))
            .json(params);
        if let Some(timeout) = timeout {
            request = request.timeout(timeout);
        }

        let response = request.send().await?;
        let status = response.status();
        let body = response.text().await?;
        debug!(method, %status, "Bot API call finished");

        let parsed: ApiResponse<R> = serde_json::from_str(&body).map_err(|err| {
            if status.is_success() {
                TelegramError::Decode(format!("{method}: {err}"))
            } else {
                TelegramError::Api {
                    code: i64::from(status.as_u16()),
                    description: status.canonical_reason().unwrap_or("unknown").to_string(),
                    retry_after: None,
                }
            }
        })?;

        if !parsed.ok {
            return Err(TelegramError::Api {
                code: parsed
                    .error_code
                    .unwrap_or_else(|| i64::from(status.as_u16())),
                description: parsed.description.unwrap_or_default(),
                retry_after: parsed.parameters.and_then(|p| p.retry_after),
            });
        }
        parsed
            .result
            .ok_or_else(|| TelegramError::Decode(format!("{method}: missing result")))
    }

    pub async fn get_me(&self) -> Result<User, TelegramError> {
        self.call("getMe", &serde_json::json!({}), None).await
    }

    pub async fn get_updates(
        &self,
        offset: Option<i64>,
        poll_timeout: Duration,
    ) -> Result<Vec<Update>, TelegramError> {
        let params = GetUpdatesParams {
            offset,
            limit: None,
            timeout: poll_timeout.as_secs(),
            allowed_updates: ALLOWED_UPDATES,
        };
        self.call(
            "getUpdates",
            &params,
            Some(poll_timeout.saturating_add(POLL_GRACE)),
        )
        .await
    }

    /// Returns the offset that skips every update queued before startup.
    pub async fn skip_pending_updates(&self) -> Result<Option<i64>, TelegramError> {
        let params = GetUpdatesParams {
            offset: Some(-1),
            limit: Some(1),
            timeout: 0,
            allowed_updates: ALLOWED_UPDATES,
        };
        let updates: Vec<Update> = self.call("getUpdates", &params, None).await?;
        Ok(updates.last().map(|update| update.update_id + 1))
    }

    pub async fn send_text(
        &self,
        chat_id: ChatId,
        text: &str,
        controls: &[Control],
    ) -> Result<Message, TelegramError> {
        let params = SendMessageParams {
            chat_id: chat_id.0,
            text,
            reply_markup: keyboard(controls),
        };
        self.call("sendMessage", &params, None).await
    }

    /// Editing to identical content is reported by the Bot API as an error and
    /// treated as success here.
    pub async fn edit_text(
        &self,
        target: MessageRef,
        text: &str,
        controls: &[Control],
    ) -> Result<(), TelegramError> {
        let params = EditMessageTextParams {
            chat_id: target.chat_id.0,
            message_id: target.message_id.0,
            text,
            reply_markup: keyboard(controls),
        };
        match self
            .call::<_, serde_json::Value>("editMessageText", &params, None)
            .await
        {
            Ok(_) => Ok(()),
            Err(err) if err.is_not_modified() => {
                debug!(
                    chat_id = %target.chat_id,
                    message_id = %target.message_id,
                    "message already up to date"
                );
                Ok(())
            }
            Err(err) => Err(err),
        }
    }

    pub async fn delete(&self, target: MessageRef) -> Result<(), TelegramError> {
        let params = DeleteMessageParams {
            chat_id: target.chat_id.0,
            message_id: target.message_id.0,
        };
        let _: bool = self.call("deleteMessage", &params, None).await?;
        Ok(())
    }

    pub async fn get_chat_member(
        &self,
        channel: &ChannelRef,
        user_id: UserId,
    ) -> Result<ChatMember, TelegramError> {
        let chat_id = channel.chat_handle();
        let params = GetChatMemberParams {
            chat_id: &chat_id,
            user_id: user_id.0,
        };
        self.call("getChatMember", &params, None).await
    }

    pub async fn answer_callback_query(&self, callback_query_id: &str) -> Result<(), TelegramError> {
        let params = AnswerCallbackQueryParams { callback_query_id };
        let _: bool = self.call("answerCallbackQuery", &params, None).await?;
        Ok(())
    }
}

/// One control per row, in order.
pub fn keyboard(controls: &[Control]) -> Option<InlineKeyboardMarkup> {
    if controls.is_empty() {
        return None;
    }
    let inline_keyboard = controls
        .iter()
        .map(|control| {
            let button = match control.action {
                ControlAction::Url => InlineKeyboardButton {
                    text: control.label.clone(),
                    url: Some(control.target.clone()),
                    callback_data: None,
                },
                ControlAction::Callback => InlineKeyboardButton {
                    text: control.label.clone(),
                    url: None,
                    callback_data: Some(control.target.clone()),
                },
            };
            vec![button]
        })
        .collect();
    Some(InlineKeyboardMarkup { inline_keyboard })
}

fn oracle_error(err: TelegramError) -> OracleError {
    match err {
        TelegramError::Api {
            code: 400 | 403,
            description,
            ..
        } => OracleError::AccessDenied(description),
        other => OracleError::Unreachable(other.to_string()),
    }
}

fn sink_error(err: TelegramError) -> SinkError {
    match err {
        TelegramError::Api { .. } => SinkError::Rejected(err.to_string()),
        other => SinkError::Transport(other.to_string()),
    }
}

#[async_trait]
impl MembershipOracle for TelegramClient {
    async fn get_membership(
        &self,
        channel: &ChannelRef,
        user_id: UserId,
    ) -> Result<MembershipStatus, OracleError> {
        let member = self
            .get_chat_member(channel, user_id)
            .await
            .map_err(oracle_error)?;
        Ok(MembershipStatus::from_api(&member.status))
    }
}

#[async_trait]
impl MessageSink for TelegramClient {
    async fn send_message(
        &self,
        chat_id: ChatId,
        text: &str,
        controls: &[Control],
    ) -> Result<MessageRef, SinkError> {
        let message = self
            .send_text(chat_id, text, controls)
            .await
            .map_err(sink_error)?;
        Ok(MessageRef {
            chat_id: ChatId(message.chat.id),
            message_id: MessageId(message.message_id),
        })
    }

    async fn edit_message(
        &self,
        target: MessageRef,
        text: &str,
        controls: &[Control],
    ) -> Result<(), SinkError> {
        self.edit_text(target, text, controls)
            .await
            .map_err(sink_error)
    }

    async fn delete_message(&self, target: MessageRef) -> Result<(), SinkError> {
        self.delete(target).await.map_err(sink_error)
    }
}

#[cfg(test)]
#[path = "tests/client_tests.rs"]
mod tests;
