use shared::{
    domain::{ChannelRef, UserId},
    error::OracleErrorKind,
    protocol::{CallbackAction, Control},
};

pub const GREETING: &str = "👋 Hi! Press «🚀 Start» to get your gift 🎁";
pub const BEGIN_LABEL: &str = "🚀 Start";

pub const INSTRUCTIONS: &str =
    "To get the gift, subscribe to the channel and press «🔄 I've subscribed!».";
pub const NOT_SUBSCRIBED: &str =
    "You haven't subscribed to the channel yet! Subscribe and press the button below.";
pub const SUBSCRIBE_LABEL: &str = "📢 Subscribe to the channel";
pub const RECHECK_LABEL: &str = "🔄 I've subscribed!";

pub const ACCESS_DENIED: &str = "Could not read the channel's member list.\n\
     Make sure the bot has been added to the channel administrators.";
pub const UNREACHABLE: &str =
    "The subscription check is temporarily unavailable. Please try again in a minute.";

pub fn reward(reward_url: &str) -> String {
    format!("Thanks for subscribing! 🎉\n\nHere is your gift:\n{reward_url}")
}

pub fn check_failed(kind: OracleErrorKind) -> &'static str {
    match kind {
        OracleErrorKind::AccessDenied => ACCESS_DENIED,
        OracleErrorKind::Unreachable => UNREACHABLE,
    }
}

pub fn storage_failure_notice(user_id: UserId, detail: &str) -> String {
    format!("⚠️ Failed to save subscription record for user {user_id}: {detail}")
}

pub fn begin_controls() -> Vec<Control> {
    vec![Control::callback(BEGIN_LABEL, CallbackAction::Begin)]
}

/// Channel link first, recheck second; rendered one per row.
pub fn subscribe_controls(channel: &ChannelRef) -> Vec<Control> {
    vec![
        Control::url(SUBSCRIBE_LABEL, channel.subscribe_url()),
        Control::callback(RECHECK_LABEL, CallbackAction::Recheck),
    ]
}
