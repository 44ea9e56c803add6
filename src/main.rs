use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use parley::agent::Agent;
use parley::cli;
use parley::config::Config;
use parley::history::Store;
use parley::llm::{ModelClient, OpenAiChatProvider};
use parley::tenant::TenantId;

#[derive(Parser, Debug)]
#[command(name = "parley", version, about = "Multi-tenant conversational agent")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Converse with the agent (interactive unless --message is given)
    Chat {
        /// Tenant to converse as (overrides TENANT_ID)
        #[arg(long)]
        tenant: Option<String>,

        /// Send a single message and exit
        #[arg(long)]
        message: Option<String>,
    },

    /// Probe the conversation store and the model endpoint
    Health,

    /// Print a tenant's recent turns, oldest first
    History {
        /// Tenant to inspect (overrides TENANT_ID)
        #[arg(long)]
        tenant: Option<String>,

        /// Number of turns to print
        #[arg(long, default_value_t = 20)]
        limit: usize,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Cli::parse();
    let config = Config::from_env()?;

    let store = Store::new(&config.database)?;

    let provider = OpenAiChatProvider::new(config.model.clone())?;
    let model = ModelClient::new(
        Arc::new(provider),
        config.model.retry_policy(),
        config.model.timeout,
    );

    match args.command {
        Command::Chat { tenant, message } => {
            let tenant = resolve_tenant(tenant, &config)?;
            store.run_migrations().await?;
            let agent = Agent::new(Arc::new(store), model, config.agent.clone());
            cli::run_chat(&agent, &tenant, message).await
        }
        // No migrations here: the probe must report an unreachable store,
        // not abort on it.
        Command::Health => {
            let code = cli::run_health(&store, &model).await;
            std::process::exit(code);
        }
        Command::History { tenant, limit } => {
            let tenant = resolve_tenant(tenant, &config)?;
            store.run_migrations().await?;
            cli::run_history(&store, &tenant, limit).await
        }
    }
}

fn resolve_tenant(flag: Option<String>, config: &Config) -> anyhow::Result<TenantId> {
    let raw = flag
        .or_else(|| config.tenant.clone())
        .ok_or_else(|| anyhow::anyhow!("no tenant configured: set TENANT_ID or pass --tenant"))?;
    Ok(TenantId::new(raw)?)
}
