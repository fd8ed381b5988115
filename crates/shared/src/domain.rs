use std::{fmt, str::FromStr};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::DomainError;

macro_rules! id_newtype {
    ($name:ident) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub struct $name(pub i64);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

id_newtype!(UserId);
id_newtype!(ChatId);
id_newtype!(MessageId);

/// The message a user is acting on; edit-in-place responses target it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MessageRef {
    pub chat_id: ChatId,
    pub message_id: MessageId,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionStatus {
    Started,
    Subscribed,
    NotSubscribed,
}

impl SubscriptionStatus {
    pub const ALL: [SubscriptionStatus; 3] = [
        SubscriptionStatus::Started,
        SubscriptionStatus::Subscribed,
        SubscriptionStatus::NotSubscribed,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            SubscriptionStatus::Started => "started",
            SubscriptionStatus::Subscribed => "subscribed",
            SubscriptionStatus::NotSubscribed => "not_subscribed",
        }
    }

    pub fn from_membership(membership: &MembershipStatus) -> Self {
        if membership.is_subscribed() {
            SubscriptionStatus::Subscribed
        } else {
            SubscriptionStatus::NotSubscribed
        }
    }
}

impl fmt::Display for SubscriptionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SubscriptionStatus {
    type Err = DomainError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw {
            "started" => Ok(SubscriptionStatus::Started),
            "subscribed" => Ok(SubscriptionStatus::Subscribed),
            "not_subscribed" => Ok(SubscriptionStatus::NotSubscribed),
            other => Err(DomainError::UnknownStatus(other.to_string())),
        }
    }
}

/// Platform-reported relation of a user to a channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MembershipStatus {
    Owner,
    Administrator,
    Member,
    Restricted,
    Left,
    Kicked,
    Unknown(String),
}

impl MembershipStatus {
    /// Maps a Bot API `ChatMember.status` string. The Bot API reports the
    /// channel owner as `creator`.
    pub fn from_api(raw: &str) -> Self {
        match raw {
            "creator" | "owner" => MembershipStatus::Owner,
            "administrator" => MembershipStatus::Administrator,
            "member" => MembershipStatus::Member,
            "restricted" => MembershipStatus::Restricted,
            "left" => MembershipStatus::Left,
            "kicked" => MembershipStatus::Kicked,
            other => MembershipStatus::Unknown(other.to_string()),
        }
    }

    pub fn is_subscribed(&self) -> bool {
        matches!(
            self,
            MembershipStatus::Owner | MembershipStatus::Administrator | MembershipStatus::Member
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    pub user_id: UserId,
    pub username: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
}

impl UserProfile {
    pub fn new(user_id: UserId) -> Self {
        Self {
            user_id,
            username: None,
            first_name: None,
            last_name: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRecord {
    pub user_id: UserId,
    pub username: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub subscription_status: SubscriptionStatus,
    /// Set by the first insert; later upserts leave it alone.
    pub created_at: DateTime<Utc>,
    pub last_checked: DateTime<Utc>,
}

impl UserRecord {
    pub fn from_profile(
        profile: &UserProfile,
        subscription_status: SubscriptionStatus,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            user_id: profile.user_id,
            username: profile.username.clone(),
            first_name: profile.first_name.clone(),
            last_name: profile.last_name.clone(),
            subscription_status,
            created_at: now,
            last_checked: now,
        }
    }

    pub fn profile(&self) -> UserProfile {
        UserProfile {
            user_id: self.user_id,
            username: self.username.clone(),
            first_name: self.first_name.clone(),
            last_name: self.last_name.clone(),
        }
    }
}

/// A public channel addressed by its username, stored without the leading `@`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChannelRef(String);

impl ChannelRef {
    pub fn parse(raw: &str) -> Result<Self, DomainError> {
        let name = raw.trim();
        let name = name.strip_prefix('@').unwrap_or(name).trim();
        if name.is_empty() {
            return Err(DomainError::EmptyChannel);
        }
        if name.chars().any(char::is_whitespace) {
            return Err(DomainError::InvalidChannel(raw.to_string()));
        }
        Ok(Self(name.to_string()))
    }

    pub fn name(&self) -> &str {
        &self.0
    }

    /// The `chat_id` form accepted by the Bot API for public channels.
    pub fn chat_handle(&self) -> String {
        format!("@{}", self.0)
    }

    pub fn subscribe_url(&self) -> String {
        format!("https://t.me/{}", self.0)
    }
}

impl fmt::Display for ChannelRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "@{}", self.0)
    }
}

#[cfg(test)]
#[path = "tests/domain_tests.rs"]
mod tests;
