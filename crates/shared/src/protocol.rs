use serde::{Deserialize, Serialize};

use crate::domain::{MessageRef, UserId, UserProfile};

/// Callback data carried by inline controls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CallbackAction {
    #[serde(rename = "start_check_subscription")]
    Begin,
    #[serde(rename = "check_subscription")]
    Recheck,
}

impl CallbackAction {
    pub fn as_data(self) -> &'static str {
        match self {
            CallbackAction::Begin => "start_check_subscription",
            CallbackAction::Recheck => "check_subscription",
        }
    }

    pub fn from_data(data: &str) -> Option<Self> {
        match data {
            "start_check_subscription" => Some(CallbackAction::Begin),
            "check_subscription" => Some(CallbackAction::Recheck),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum InboundEvent {
    StartCommand {
        profile: UserProfile,
        origin: MessageRef,
    },
    BeginActivation {
        user_id: UserId,
        origin: MessageRef,
    },
    RecheckActivation {
        profile: UserProfile,
        origin: MessageRef,
    },
}

impl InboundEvent {
    pub fn user_id(&self) -> UserId {
        match self {
            InboundEvent::StartCommand { profile, .. }
            | InboundEvent::RecheckActivation { profile, .. } => profile.user_id,
            InboundEvent::BeginActivation { user_id, .. } => *user_id,
        }
    }

    pub fn origin(&self) -> MessageRef {
        match self {
            InboundEvent::StartCommand { origin, .. }
            | InboundEvent::BeginActivation { origin, .. }
            | InboundEvent::RecheckActivation { origin, .. } => *origin,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            InboundEvent::StartCommand { .. } => "start",
            InboundEvent::BeginActivation { .. } => "begin",
            InboundEvent::RecheckActivation { .. } => "recheck",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ControlAction {
    Url,
    Callback,
}

/// A button attached to an outbound message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Control {
    pub label: String,
    pub action: ControlAction,
    pub target: String,
}

impl Control {
    pub fn url(label: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            action: ControlAction::Url,
            target: url.into(),
        }
    }

    pub fn callback(label: impl Into<String>, action: CallbackAction) -> Self {
        Self {
            label: label.into(),
            action: ControlAction::Callback,
            target: action.as_data().to_string(),
        }
    }
}
