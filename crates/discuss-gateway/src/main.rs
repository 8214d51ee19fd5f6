use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use discuss_agent::openai::OpenAiProvider;
use discuss_agent::provider::{ChatRequest, ChatResponse, LlmProvider, ProviderError};
use discuss_agent::router::{ProviderRouter, ProviderSlot};
use discuss_agent::LlmCompletionProvider;
use discuss_channels::TransportRegistry;
use discuss_core::{Channel, DiscussConfig};
use discuss_relay::{MemoryDedupCache, MessageRelay};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

mod app;
mod http;

/// How often expired multipart dedup entries are swept.
const DEDUP_PURGE_INTERVAL: Duration = Duration::from_secs(300);

/// SMS and WhatsApp webhooks relayed to a chat-completion model.
#[derive(Parser, Debug)]
#[command(name = "discuss-gateway", version)]
struct Args {
    /// Config file (default: $DISCUSS_CONFIG, then ~/.discuss/discuss.toml).
    #[arg(long)]
    config: Option<String>,

    /// Address to listen on, overriding gateway.bind.
    #[arg(long)]
    bind: Option<String>,

    /// Port to listen on, overriding gateway.port.
    #[arg(long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "discuss_gateway=info,tower_http=debug".into()),
        )
        .init();

    let args = Args::parse();

    // explicit flag > DISCUSS_CONFIG env > ~/.discuss/discuss.toml
    let config_path = args
        .config
        .clone()
        .or_else(|| std::env::var("DISCUSS_CONFIG").ok());
    let config = DiscussConfig::load(config_path.as_deref()).unwrap_or_else(|e| {
        warn!("Config load failed ({}), using defaults", e);
        DiscussConfig::default().with_legacy_env()
    });

    let bind = args.bind.clone().unwrap_or_else(|| config.gateway.bind.clone());
    let port = args.port.unwrap_or(config.gateway.port);

    let db_path = &config.database.path;
    ensure_parent_dir(db_path);
    info!(path = %db_path, "opening SQLite database");

    let db = rusqlite::Connection::open(db_path)?;
    db.execute_batch("PRAGMA journal_mode=WAL;")?;
    discuss_messages::db::init_db(&db)?;
    let messages = discuss_messages::MessageStore::new(db);

    let completions = Arc::new(LlmCompletionProvider::new(
        build_provider(&config),
        config.agent.model.clone(),
        config.agent.max_tokens,
    ));

    let transports = build_transports(&config);
    let channels = transports.channels();
    if channels.is_empty() {
        warn!("No channel transport configured; replies will not be delivered");
    }

    let cache = Arc::new(MemoryDedupCache::new());
    let relay = MessageRelay::new(completions, Arc::new(transports), cache.clone())
        .with_multipart_ttl(Duration::from_secs(config.relay.multipart_ttl_secs))
        .with_support_contact(config.relay.support_contact.clone());

    let state = Arc::new(app::AppState::new(config, relay, messages, channels));
    let router = app::build_router(state.clone());

    tokio::spawn(purge_dedup_loop(cache, state.shutdown.clone()));

    let addr: SocketAddr = format!("{}:{}", bind, port).parse()?;
    info!("discuss gateway listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    let shutdown = state.shutdown.clone();
    axum::serve(listener, router)
        .with_graceful_shutdown(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!(error = %e, "cannot listen for shutdown signal");
                return;
            }
            info!("shutdown requested, cancelling in-flight relays");
            shutdown.cancel();
        })
        .await?;

    Ok(())
}

/// Build the LLM provider chain from config.
///
/// Slot order: providers.openai, then providers.openai_compat[*] in
/// declaration order. Several slots are wrapped in a ProviderRouter so
/// requests fail over to the next slot on error.
fn build_provider(config: &DiscussConfig) -> Box<dyn LlmProvider> {
    let mut slots: Vec<ProviderSlot> = Vec::new();

    if let Some(ref openai) = config.providers.openai {
        info!(
            "LLM provider slot[{}]: OpenAI ({})",
            slots.len(),
            openai.base_url
        );
        slots.push(ProviderSlot::new(
            Box::new(OpenAiProvider::new(
                openai.api_key.clone(),
                Some(openai.base_url.clone()),
            )),
            1,
        ));
    }

    for entry in &config.providers.openai_compat {
        info!(
            "LLM provider slot[{}]: {} ({})",
            slots.len(),
            entry.id,
            entry.base_url
        );
        slots.push(ProviderSlot::new(
            Box::new(OpenAiProvider::compatible(
                entry.id.clone(),
                entry.api_key.clone(),
                entry.base_url.clone(),
                entry.chat_path.clone(),
                entry.model.clone(),
            )),
            1,
        ));
    }

    if slots.len() == 1 {
        return slots.remove(0).provider;
    }

    match ProviderRouter::new(slots) {
        Ok(router) => {
            info!(
                "ProviderRouter: {} slots configured (automatic failover)",
                router.len()
            );
            Box::new(router)
        }
        Err(_) => {
            warn!("No LLM provider configured; every prompt gets the failure notice");
            Box::new(NullProvider)
        }
    }
}

fn build_transports(config: &DiscussConfig) -> TransportRegistry {
    let mut registry = TransportRegistry::new();
    if let Some(ref sms) = config.channels.sms {
        registry.register(
            Channel::Sms,
            Arc::new(discuss_sms::NexmoTransport::new(sms)),
        );
    }
    if let Some(ref whatsapp) = config.channels.whatsapp {
        registry.register(
            Channel::Whatsapp,
            Arc::new(discuss_whatsapp::CloudApiTransport::new(whatsapp)),
        );
    }
    registry
}

async fn purge_dedup_loop(cache: Arc<MemoryDedupCache>, shutdown: CancellationToken) {
    let mut ticker = tokio::time::interval(DEDUP_PURGE_INTERVAL);
    loop {
        tokio::select! {
            _ = shutdown.cancelled() => break,
            _ = ticker.tick() => {
                cache.purge_expired();
            }
        }
    }
}

/// Ensure the parent directory for a file path exists.
fn ensure_parent_dir(path: &str) {
    if let Some(parent) = std::path::Path::new(path).parent() {
        let _ = std::fs::create_dir_all(parent);
    }
}

/// Placeholder provider when no API key is available.
struct NullProvider;

#[async_trait::async_trait]
impl LlmProvider for NullProvider {
    fn name(&self) -> &str {
        "null"
    }

    async fn send(&self, _req: &ChatRequest) -> Result<ChatResponse, ProviderError> {
        Err(ProviderError::Unavailable(
            "no LLM provider configured; set providers.openai.api_key in discuss.toml".into(),
        ))
    }
}
