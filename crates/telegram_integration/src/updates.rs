use shared::{
    domain::{ChatId, MessageId, MessageRef, UserId, UserProfile},
    protocol::{CallbackAction, InboundEvent},
};

use crate::types::{Message, Update, User};

const START_COMMAND: &str = "/start";

/// What the dispatcher should do with one update.
#[derive(Debug, Clone, Default)]
pub struct Incoming {
    pub event: Option<InboundEvent>,
    /// Every callback query is answered, handled or not.
    pub callback_query_id: Option<String>,
}

/// `bot_username` is the `getMe` username; `/start@other_bot` is rejected once it is known.
pub fn translate(update: &Update, bot_username: Option<&str>) -> Incoming {
    if let Some(query) = &update.callback_query {
        let event = match (&query.message, query.data.as_deref()) {
            (Some(message), Some(data)) => {
                CallbackAction::from_data(data).map(|action| match action {
                    CallbackAction::Begin => InboundEvent::BeginActivation {
                        user_id: UserId(query.from.id),
                        origin: message_ref(message),
                    },
                    CallbackAction::Recheck => InboundEvent::RecheckActivation {
                        profile: profile(&query.from),
                        origin: message_ref(message),
                    },
                })
            }
            _ => None,
        };
        return Incoming {
            event,
            callback_query_id: Some(query.id.clone()),
        };
    }

    let event = update
        .message
        .as_ref()
        .filter(|message| message.chat.kind == "private")
        .filter(|message| {
            message
                .text
                .as_deref()
                .is_some_and(|text| is_start_command(text, bot_username))
        })
        .and_then(|message| {
            let from = message.from.as_ref().filter(|from| !from.is_bot)?;
            Some(InboundEvent::StartCommand {
                profile: profile(from),
                origin: message_ref(message),
            })
        });
    Incoming {
        event,
        callback_query_id: None,
    }
}

/// Accepts `/start`, `/start <payload>` and `/start@botname` addressed to this bot.
pub fn is_start_command(text: &str, bot_username: Option<&str>) -> bool {
    let Some(command) = text.split_whitespace().next() else {
        return false;
    };
    let (command, mention) = match command.split_once('@') {
        Some((command, mention)) => (command, Some(mention)),
        None => (command, None),
    };
    if command != START_COMMAND {
        return false;
    }
    match (mention, bot_username) {
        (Some(mention), Some(username)) => mention.eq_ignore_ascii_case(username),
        _ => true,
    }
}

fn profile(user: &User) -> UserProfile {
    UserProfile {
        user_id: UserId(user.id),
        username: user.username.clone(),
        first_name: Some(user.first_name.clone()),
        last_name: user.last_name.clone(),
    }
}

fn message_ref(message: &Message) -> MessageRef {
    MessageRef {
        chat_id: ChatId(message.chat.id),
        message_id: MessageId(message.message_id),
    }
}

#[cfg(test)]
#[path = "tests/updates_tests.rs"]
mod tests;
