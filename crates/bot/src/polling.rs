use std::{future::Future, sync::Arc, time::Duration};

use async_trait::async_trait;
use gate_api::SubscriptionWorkflow;
use telegram_integration::{translate, types::Update, TelegramClient, TelegramError};
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

const ERROR_BACKOFF: Duration = Duration::from_secs(5);
const MAX_BACKOFF: Duration = Duration::from_secs(300);

#[async_trait]
pub trait UpdateSource: Send + Sync {
    async fn skip_pending(&self) -> Result<Option<i64>, TelegramError>;
    async fn next_batch(
        &self,
        offset: Option<i64>,
        poll_timeout: Duration,
    ) -> Result<Vec<Update>, TelegramError>;
    async fn answer_callback(&self, callback_query_id: &str) -> Result<(), TelegramError>;
}

#[async_trait]
impl UpdateSource for TelegramClient {
    async fn skip_pending(&self) -> Result<Option<i64>, TelegramError> {
        self.skip_pending_updates().await
    }

    async fn next_batch(
        &self,
        offset: Option<i64>,
        poll_timeout: Duration,
    ) -> Result<Vec<Update>, TelegramError> {
        self.get_updates(offset, poll_timeout).await
    }

    async fn answer_callback(&self, callback_query_id: &str) -> Result<(), TelegramError> {
        self.answer_callback_query(callback_query_id).await
    }
}

/// Long-polls for updates and runs each one on its own task.
pub struct Poller {
    source: Arc<dyn UpdateSource>,
    workflow: SubscriptionWorkflow,
    poll_timeout: Duration,
    bot_username: Option<String>,
}

impl Poller {
    pub fn new(
        source: Arc<dyn UpdateSource>,
        workflow: SubscriptionWorkflow,
        poll_timeout: Duration,
        bot_username: Option<String>,
    ) -> Self {
        Self {
            source,
            workflow,
            poll_timeout,
            bot_username,
        }
    }

    /// Runs until `shutdown` resolves, then waits for in-flight handlers.
    pub async fn run(self, shutdown: impl Future<Output = ()>) {
        tokio::pin!(shutdown);
        let mut tasks = JoinSet::new();

        let mut offset = match self.source.skip_pending().await {
            Ok(offset) => offset,
            Err(error) => {
                warn!(%error, "could not skip pending updates");
                None
            }
        };
        info!(
            poll_timeout_secs = self.poll_timeout.as_secs(),
            "polling for updates"
        );

        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    info!("shutdown requested; stopping update polling");
                    break;
                }
                batch = self.source.next_batch(offset, self.poll_timeout) => match batch {
                    Ok(updates) => {
                        for update in updates {
                            offset = Some(update.update_id + 1);
                            self.dispatch(&mut tasks, &update);
                        }
                        while let Some(joined) = tasks.try_join_next() {
                            log_join(joined);
                        }
                    }
                    Err(error) => {
                        let backoff = backoff_after(&error);
                        warn!(%error, backoff_secs = backoff.as_secs(), "getUpdates failed; retrying");
                        tokio::select! {
                            _ = &mut shutdown => break,
                            _ = tokio::time::sleep(backoff) => {}
                        }
                    }
                },
            }
        }

        let in_flight = tasks.len();
        if in_flight > 0 {
            info!(in_flight, "waiting for update handlers to finish");
        }
        while let Some(joined) = tasks.join_next().await {
            log_join(joined);
        }
    }

    fn dispatch(&self, tasks: &mut JoinSet<()>, update: &Update) {
        let incoming = translate(update, self.bot_username.as_deref());
        if incoming.event.is_none() && incoming.callback_query_id.is_none() {
            debug!(update_id = update.update_id, "ignoring update");
            return;
        }

        let source = Arc::clone(&self.source);
        let workflow = self.workflow.clone();
        let update_id = update.update_id;
        tasks.spawn(async move {
            if let Some(callback_query_id) = incoming.callback_query_id.as_deref() {
                if let Err(error) = source.answer_callback(callback_query_id).await {
                    warn!(update_id, %error, "could not answer callback query");
                }
            }

            let Some(event) = incoming.event else {
                debug!(update_id, "callback query without a known action");
                return;
            };
            let user_id = event.user_id();
            match workflow.handle(event).await {
                Ok(outcome) => debug!(update_id, %user_id, ?outcome, "update handled"),
                Err(error) => error!(update_id, %user_id, %error, "failed to handle update"),
            }
        });
    }
}

/// Honours the Bot API's flood-control hint, bounded above.
fn backoff_after(error: &TelegramError) -> Duration {
    error
        .retry_after()
        .map_or(ERROR_BACKOFF, |delay| delay.min(MAX_BACKOFF))
}

fn log_join(joined: Result<(), tokio::task::JoinError>) {
    if let Err(error) = joined {
        error!(%error, "update handler panicked");
    }
}

#[cfg(test)]
#[path = "tests/polling_tests.rs"]
mod tests;
