use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use shared::{
    domain::{
        ChannelRef, ChatId, MembershipStatus, MessageRef, SubscriptionStatus, UserId, UserProfile,
        UserRecord,
    },
    error::{OracleError, OracleErrorKind},
    protocol::{Control, InboundEvent},
};
use storage::{StorageError, UserRecordStore};
use thiserror::Error;
use tracing::{error, info, warn};

pub mod messages;

#[async_trait]
pub trait MembershipOracle: Send + Sync {
    async fn get_membership(
        &self,
        channel: &ChannelRef,
        user_id: UserId,
    ) -> Result<MembershipStatus, OracleError>;
}

#[derive(Debug, Error)]
pub enum SinkError {
    #[error("message delivery rejected: {0}")]
    Rejected(String),
    #[error("message transport failed: {0}")]
    Transport(String),
}

#[async_trait]
pub trait MessageSink: Send + Sync {
    async fn send_message(
        &self,
        chat_id: ChatId,
        text: &str,
        controls: &[Control],
    ) -> Result<MessageRef, SinkError>;
    async fn edit_message(
        &self,
        target: MessageRef,
        text: &str,
        controls: &[Control],
    ) -> Result<(), SinkError>;
    async fn delete_message(&self, target: MessageRef) -> Result<(), SinkError>;
}

#[derive(Debug, Clone)]
pub struct GateConfig {
    pub channel: ChannelRef,
    pub reward_url: String,
    /// Chat that receives a notice whenever a record cannot be saved.
    pub operator_chat: Option<ChatId>,
}

/// Transition taken while handling one event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Greeted,
    Prompted,
    Rewarded,
    StillNotSubscribed,
    CheckFailed(OracleErrorKind),
}

#[derive(Debug, Error)]
pub enum WorkflowError {
    #[error("failed to deliver response: {0}")]
    Sink(#[from] SinkError),
}

#[derive(Clone)]
pub struct SubscriptionWorkflow {
    store: Arc<dyn UserRecordStore>,
    oracle: Arc<dyn MembershipOracle>,
    sink: Arc<dyn MessageSink>,
    config: GateConfig,
}

impl SubscriptionWorkflow {
    pub fn new(
        store: Arc<dyn UserRecordStore>,
        oracle: Arc<dyn MembershipOracle>,
        sink: Arc<dyn MessageSink>,
        config: GateConfig,
    ) -> Self {
        Self {
            store,
            oracle,
            sink,
            config,
        }
    }

    pub async fn handle(&self, event: InboundEvent) -> Result<Outcome, WorkflowError> {
        match event {
            InboundEvent::StartCommand { profile, origin } => self.on_start(&profile, origin).await,
            InboundEvent::BeginActivation { user_id, origin } => {
                self.on_begin(user_id, origin).await
            }
            InboundEvent::RecheckActivation { profile, origin } => {
                self.on_recheck(&profile, origin).await
            }
        }
    }

    async fn on_start(
        &self,
        profile: &UserProfile,
        origin: MessageRef,
    ) -> Result<Outcome, WorkflowError> {
        self.record(profile, SubscriptionStatus::Started).await;

        if let Err(error) = self.sink.delete_message(origin).await {
            warn!(
                user_id = %profile.user_id,
                chat_id = %origin.chat_id,
                %error,
                "could not delete start command"
            );
        }

        self.sink
            .send_message(origin.chat_id, messages::GREETING, &messages::begin_controls())
            .await?;
        info!(user_id = %profile.user_id, "user started");
        Ok(Outcome::Greeted)
    }

    async fn on_begin(&self, user_id: UserId, origin: MessageRef) -> Result<Outcome, WorkflowError> {
        self.sink
            .edit_message(
                origin,
                messages::INSTRUCTIONS,
                &messages::subscribe_controls(&self.config.channel),
            )
            .await?;
        info!(%user_id, "subscribe prompt shown");
        Ok(Outcome::Prompted)
    }

    async fn on_recheck(
        &self,
        profile: &UserProfile,
        origin: MessageRef,
    ) -> Result<Outcome, WorkflowError> {
        let membership = match self
            .oracle
            .get_membership(&self.config.channel, profile.user_id)
            .await
        {
            Ok(membership) => membership,
            Err(error) => {
                // The prompt the user acted on stays intact; the diagnostic is a new message.
                warn!(
                    user_id = %profile.user_id,
                    channel = %self.config.channel,
                    %error,
                    "membership check failed"
                );
                let kind = error.kind();
                self.sink
                    .send_message(origin.chat_id, messages::check_failed(kind), &[])
                    .await?;
                return Ok(Outcome::CheckFailed(kind));
            }
        };

        let status = SubscriptionStatus::from_membership(&membership);
        self.record(profile, status).await;
        info!(
            user_id = %profile.user_id,
            ?membership,
            %status,
            "membership checked"
        );

        match status {
            SubscriptionStatus::Subscribed => {
                self.sink
                    .edit_message(origin, &messages::reward(&self.config.reward_url), &[])
                    .await?;
                Ok(Outcome::Rewarded)
            }
            SubscriptionStatus::NotSubscribed | SubscriptionStatus::Started => {
                self.sink
                    .edit_message(
                        origin,
                        messages::NOT_SUBSCRIBED,
                        &messages::subscribe_controls(&self.config.channel),
                    )
                    .await?;
                Ok(Outcome::StillNotSubscribed)
            }
        }
    }

    /// Storage failures are reported but never abort the user's interaction.
    async fn record(&self, profile: &UserProfile, status: SubscriptionStatus) {
        let record = UserRecord::from_profile(profile, status, Utc::now());
        if let Err(error) = self.store.upsert(&record).await {
            self.report_storage_failure(profile.user_id, &error).await;
        }
    }

    async fn report_storage_failure(&self, user_id: UserId, error: &StorageError) {
        error!(%user_id, %error, "failed to persist user record");

        let Some(operator_chat) = self.config.operator_chat else {
            return;
        };
        let notice = messages::storage_failure_notice(user_id, &error.to_string());
        if let Err(sink_error) = self.sink.send_message(operator_chat, &notice, &[]).await {
            warn!(
                %user_id,
                %operator_chat,
                error = %sink_error,
                "could not notify operator about storage failure"
            );
        }
    }
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
