//! mailsync - inspect and refresh the local message cache.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use mailsync_core::sync::SyncJob;
use mailsync_core::{
    Credential, EngineConfig, LinkSource, MessageCache, MessageRequest, ProviderAggregator,
    ProviderLink, ProviderRegistry, ProviderType, RequestContext, SqliteStore, SummariesRequest,
    SyncFlags, SyncWorker, UserId,
};

#[derive(Parser)]
#[command(name = "mailsync")]
#[command(about = "Message cache and multi-provider sync engine", long_about = None)]
struct Cli {
    /// Configuration file (JSON)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Override the configured database file
    #[arg(long, global = true)]
    database: Option<PathBuf>,

    /// Deadline in seconds for the whole command, sync runs included
    #[arg(long, global = true, default_value_t = 30)]
    timeout: u64,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print one merged page of summaries
    Page {
        #[arg(long)]
        user: String,

        /// Cursor token from a previous page
        #[arg(long)]
        cursor: Option<String>,
    },

    /// Print one message
    Show {
        #[arg(long)]
        user: String,

        #[arg(long)]
        id: String,
    },

    /// Link a provider to a user
    Link {
        #[arg(long)]
        user: String,

        #[arg(long)]
        provider: ProviderType,

        /// Provider settings as a JSON object
        #[arg(long)]
        settings: Option<String>,
    },

    /// Remove a provider link
    Unlink {
        #[arg(long)]
        user: String,

        #[arg(long)]
        provider: ProviderType,
    },

    /// List a user's provider links
    Links {
        #[arg(long)]
        user: String,
    },

    /// Run one sync pass against a linked provider
    Sync {
        #[arg(long)]
        user: String,

        #[arg(long)]
        provider: ProviderType,

        /// Bearer access token for the provider
        #[arg(long)]
        token: String,
    },

    /// Count a user's cached messages
    Count {
        #[arg(long)]
        user: String,
    },

    /// Delete every cached message of a user
    Purge {
        #[arg(long)]
        user: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "mailsync=info,mailsync_core=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let config = load_config(&cli)?;
    let store = open_store(&config).await?;
    let ctx = RequestContext::new().with_timeout(Duration::from_secs(cli.timeout));

    let result = run(cli.cmd, &config, &store, &ctx).await;
    store.close().await;
    result
}

async fn run(
    cmd: Command,
    config: &EngineConfig,
    store: &Arc<SqliteStore>,
    ctx: &RequestContext,
) -> Result<()> {
    let aggregator = ProviderAggregator::new(
        store.clone(),
        store.clone(),
        ProviderRegistry::with_defaults(),
        config,
    )?;

    match cmd {
        Command::Page { user, cursor } => {
            let request = SummariesRequest::from_token(UserId::new(user), cursor.as_deref());
            let page = aggregator.fetch_summaries(ctx, &request).await?;
            let next = page.next_cursor.as_ref().map(|c| c.encode()).transpose()?;
            print_json(&serde_json::json!({ "items": page.items, "next": next }))
        }

        Command::Show { user, id } => {
            let message = aggregator
                .fetch_message(ctx, &MessageRequest::new(UserId::new(user), id))
                .await?;
            print_json(&message)
        }

        Command::Link {
            user,
            provider,
            settings,
        } => {
            let mut link = ProviderLink::new(UserId::new(user), provider);
            if let Some(settings) = settings {
                link = link.with_config(
                    serde_json::from_str(&settings).context("settings must be a JSON object")?,
                );
            }
            store.link_provider(&link).await?;
            info!(user_id = %link.user_id, %provider, "Provider linked");
            Ok(())
        }

        Command::Unlink { user, provider } => {
            if !store.unlink_provider(&UserId::new(user), provider).await? {
                return Err(anyhow!("{provider} is not linked"));
            }
            Ok(())
        }

        Command::Links { user } => {
            let links = store.links_for_user(&UserId::new(user)).await?;
            print_json(&links)
        }

        Command::Sync {
            user,
            provider,
            token,
        } => {
            let user = UserId::new(user);
            let link = store
                .links_for_user(&user)
                .await?
                .into_iter()
                .find(|l| l.provider == provider)
                .ok_or_else(|| anyhow!("{provider} is not linked for {user}"))?;
            let remote = ProviderRegistry::with_defaults().connect(&link, &Credential::bearer(token))?;

            let cache = Arc::new(MessageCache::new(store.clone(), config));
            let worker = SyncWorker::new(cache, Arc::new(SyncFlags::new()));
            let job = SyncJob::new(user, remote, config.sync_page_size);
            let report = ctx.run(worker.run(&job)).await?;
            print_json(&report)
        }

        Command::Count { user } => {
            println!("{}", store.count_for_user(&UserId::new(user)).await?);
            Ok(())
        }

        Command::Purge { user } => {
            let removed = aggregator.purge_user(ctx, &UserId::new(user)).await?;
            info!(removed, "Purged cached messages");
            Ok(())
        }
    }
}

fn load_config(cli: &Cli) -> Result<EngineConfig> {
    let path = cli.config.clone().or_else(|| {
        dirs::config_dir().map(|dir| dir.join("mailsync").join("config.json"))
    });
    let mut config = match path {
        Some(path) => EngineConfig::load(&path)?,
        None => EngineConfig::default(),
    };
    if let Some(database) = &cli.database {
        config.database_path.clone_from(database);
    }
    config.validate()?;
    Ok(config)
}

async fn open_store(config: &EngineConfig) -> Result<Arc<SqliteStore>> {
    if let Some(parent) = config.database_path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("creating {}", parent.display()))?;
    }
    let path = config
        .database_path
        .to_str()
        .ok_or_else(|| anyhow!("database path is not valid UTF-8"))?;
    Ok(Arc::new(SqliteStore::new(path).await?))
}

fn print_json<T: serde::Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
