#![allow(dead_code)]

use std::{
    collections::VecDeque,
    sync::{
        atomic::{AtomicI64, AtomicUsize, Ordering},
        Arc,
    },
};

use async_trait::async_trait;
use gate_api::{GateConfig, MembershipOracle, MessageSink, SinkError, SubscriptionWorkflow};
use shared::{
    domain::{ChannelRef, ChatId, MembershipStatus, MessageId, MessageRef, UserId, UserProfile},
    error::OracleError,
    protocol::Control,
};
use storage::Storage;
use tokio::sync::Mutex;

pub const REWARD_URL: &str = "https://example.com/gift";

pub struct ScriptedOracle {
    responses: Mutex<VecDeque<Result<MembershipStatus, OracleError>>>,
    calls: AtomicUsize,
}

impl ScriptedOracle {
    pub fn new(responses: impl IntoIterator<Item = Result<MembershipStatus, OracleError>>) -> Self {
        Self {
            responses: Mutex::new(responses.into_iter().collect()),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MembershipOracle for ScriptedOracle {
    async fn get_membership(
        &self,
        channel: &ChannelRef,
        _user_id: UserId,
    ) -> Result<MembershipStatus, OracleError> {
        assert_eq!(channel.name(), "gift_channel");
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.responses
            .lock()
            .await
            .pop_front()
            .unwrap_or_else(|| Err(OracleError::Unreachable("script exhausted".into())))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Delivered {
    Sent {
        chat_id: ChatId,
        text: String,
        controls: Vec<Control>,
    },
    Edited {
        target: MessageRef,
        text: String,
        controls: Vec<Control>,
    },
    Deleted {
        target: MessageRef,
    },
}

pub struct RecordingSink {
    delivered: Mutex<Vec<Delivered>>,
    next_message_id: AtomicI64,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self {
            delivered: Mutex::new(Vec::new()),
            next_message_id: AtomicI64::new(1000),
        }
    }

    pub async fn take(&self) -> Vec<Delivered> {
        std::mem::take(&mut *self.delivered.lock().await)
    }
}

#[async_trait]
impl MessageSink for RecordingSink {
    async fn send_message(
        &self,
        chat_id: ChatId,
        text: &str,
        controls: &[Control],
    ) -> Result<MessageRef, SinkError> {
        self.delivered.lock().await.push(Delivered::Sent {
            chat_id,
            text: text.to_string(),
            controls: controls.to_vec(),
        });
        Ok(MessageRef {
            chat_id,
            message_id: MessageId(self.next_message_id.fetch_add(1, Ordering::SeqCst)),
        })
    }

    async fn edit_message(
        &self,
        target: MessageRef,
        text: &str,
        controls: &[Control],
    ) -> Result<(), SinkError> {
        self.delivered.lock().await.push(Delivered::Edited {
            target,
            text: text.to_string(),
            controls: controls.to_vec(),
        });
        Ok(())
    }

    async fn delete_message(&self, target: MessageRef) -> Result<(), SinkError> {
        self.delivered.lock().await.push(Delivered::Deleted { target });
        Ok(())
    }
}

pub struct Harness {
    pub workflow: SubscriptionWorkflow,
    pub storage: Storage,
    pub oracle: Arc<ScriptedOracle>,
    pub sink: Arc<RecordingSink>,
}

pub async fn harness(
    responses: impl IntoIterator<Item = Result<MembershipStatus, OracleError>>,
) -> Harness {
    let storage = Storage::new("sqlite::memory:").await.expect("db");
    let oracle = Arc::new(ScriptedOracle::new(responses));
    let sink = Arc::new(RecordingSink::new());
    let workflow = SubscriptionWorkflow::new(
        Arc::new(storage.clone()),
        oracle.clone(),
        sink.clone(),
        GateConfig {
            channel: ChannelRef::parse("@gift_channel").expect("channel"),
            reward_url: REWARD_URL.to_string(),
            operator_chat: None,
        },
    );
    Harness {
        workflow,
        storage,
        oracle,
        sink,
    }
}

pub fn alice() -> UserProfile {
    UserProfile {
        user_id: UserId(501),
        username: Some("alice".into()),
        first_name: Some("Alice".into()),
        last_name: Some("Liddell".into()),
    }
}

/// Private chats share the user's id.
pub fn message(user_id: UserId, message_id: i64) -> MessageRef {
    MessageRef {
        chat_id: ChatId(user_id.0),
        message_id: MessageId(message_id),
    }
}
