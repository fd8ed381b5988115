use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use shared::domain::{SubscriptionStatus, UserId};
use storage::{format_timestamp, Storage};

/// Inspects an existing subscription database; a missing file is an error.
#[derive(Parser, Debug)]
struct Cli {
    #[arg(long, env = "DATABASE_URL", default_value = "sqlite://./subscriptions.db")]
    database_url: String,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Count users per subscription status.
    Snapshot {
        #[arg(long)]
        json: bool,
    },
    /// Print one user record as JSON.
    Show { user_id: i64 },
    /// Most recently checked users first.
    List {
        #[arg(long)]
        status: Option<SubscriptionStatus>,
        #[arg(long, default_value_t = 20)]
        limit: u32,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let storage = Storage::open_existing(&cli.database_url)
        .await
        .with_context(|| format!("cannot open {}", cli.database_url))?;

    match cli.command {
        Command::Snapshot { json } => {
            let snapshot = storage.status_snapshot().await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&snapshot)?);
            } else {
                for status in SubscriptionStatus::ALL {
                    println!("{:<16}{}", status.as_str(), snapshot.count(status));
                }
                if snapshot.unrecognized > 0 {
                    println!("{:<16}{}", "unrecognized", snapshot.unrecognized);
                }
                println!("{:<16}{}", "total", snapshot.total());
            }
        }
        Command::Show { user_id } => match storage.load_user(UserId(user_id)).await? {
            Some(record) => println!("{}", serde_json::to_string_pretty(&record)?),
            None => bail!("no record for user_id={user_id}"),
        },
        Command::List { status, limit } => {
            for record in storage.list_users(status, limit).await? {
                println!(
                    "{}\t{}\t{}\t{}",
                    record.user_id,
                    record.subscription_status,
                    format_timestamp(record.last_checked),
                    record.username.as_deref().unwrap_or("-"),
                );
            }
        }
    }

    storage.close().await;
    Ok(())
}
