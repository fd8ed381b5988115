use std::sync::Arc;

use anyhow::Context;
use gate_api::{GateConfig, SubscriptionWorkflow};
use storage::Storage;
use telegram_integration::TelegramClient;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

mod config;
mod polling;

use config::load_settings;
use polling::Poller;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let settings = load_settings().context("failed to load bot settings")?;
    info!(
        channel = %settings.channel,
        database_url = %settings.database_url,
        operator_reports = settings.operator_chat.is_some(),
        "settings loaded"
    );

    let storage = Storage::new(&settings.database_url)
        .await
        .map_err(|error| {
            error!(
                database_url = %settings.database_url,
                %error,
                "failed to open SQLite database; verify parent directory exists and permissions are correct"
            );
            error
        })?;

    let client = TelegramClient::new(&settings.telegram_api_url, &settings.api_token)?;
    let me = client
        .get_me()
        .await
        .context("Bot API rejected the token or is unreachable")?;
    info!(
        bot_id = me.id,
        username = me.username.as_deref().unwrap_or("<none>"),
        "authorized with Bot API"
    );

    let workflow = SubscriptionWorkflow::new(
        Arc::new(storage.clone()),
        Arc::new(client.clone()),
        Arc::new(client.clone()),
        GateConfig {
            channel: settings.channel.clone(),
            reward_url: settings.reward_url.clone(),
            operator_chat: settings.operator_chat,
        },
    );

    Poller::new(
        Arc::new(client),
        workflow,
        settings.poll_timeout,
        me.username.clone(),
    )
    .run(shutdown_signal())
    .await;

    storage.close().await;
    info!("bot stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(error) = tokio::signal::ctrl_c().await {
            error!(%error, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(error) => {
                error!(%error, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
