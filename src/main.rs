use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use lead_assist::bot::LeadBot;
use lead_assist::catalog::{CatalogLookup, StaticCatalog};
use lead_assist::channels::whatsapp::{WebhookState, WhatsAppSender, webhook_routes};
use lead_assist::config::{BotConfig, ServerConfig, WhatsAppConfig};
use lead_assist::conversation::{ConversationEngine, Replies};
use lead_assist::leads::{InMemoryLeadStore, LeadStore, LibSqlLeadStore};
use lead_assist::session::{SessionStore, spawn_sweep_task};
use tower_http::cors::{Any, CorsLayer};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Install rustls crypto provider before any TLS usage
    let _ = rustls::crypto::ring::default_provider().install_default();

    let bot_config = BotConfig::from_env().unwrap_or_else(|e| exit_with(&e));
    let server_config = ServerConfig::from_env().unwrap_or_else(|e| exit_with(&e));
    let whatsapp_config = WhatsAppConfig::from_env().unwrap_or_else(|e| {
        eprintln!("Error: {e}");
        eprintln!("  export WHATSAPP_PHONE_NUMBER_ID=...");
        eprintln!("  export WHATSAPP_ACCESS_TOKEN=...");
        std::process::exit(1);
    });

    // Initialize tracing; the file guard must live until shutdown.
    let (file_layer, _log_guard) = match &bot_config.log_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, "lead-assist.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            (
                Some(fmt::layer().with_writer(writer).with_ansi(false)),
                Some(guard),
            )
        }
        None => (None, None),
    };
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer().with_target(false))
        .with(file_layer)
        .init();

    // Catalog
    let catalog: Arc<dyn CatalogLookup> = match &bot_config.catalog_path {
        Some(path) => Arc::new(
            StaticCatalog::from_json_file(path)
                .with_context(|| format!("loading catalog from {}", path.display()))?,
        ),
        None => Arc::new(StaticCatalog::builtin()),
    };

    // Lead store
    let leads: Arc<dyn LeadStore> = match &bot_config.db_path {
        Some(path) => Arc::new(
            LibSqlLeadStore::new_local(path)
                .await
                .with_context(|| format!("opening lead database {}", path.display()))?,
        ),
        None => {
            tracing::warn!("LEAD_ASSIST_DB_PATH=memory: leads are lost on restart");
            Arc::new(InMemoryLeadStore::new())
        }
    };
    let stored_leads = match leads.count().await {
        Ok(n) => n.to_string(),
        Err(e) => {
            tracing::warn!(error = %e, "Could not count stored leads");
            "unknown".to_string()
        }
    };

    // Sessions + idle sweep
    let sessions = SessionStore::new(bot_config.session_idle_timeout);
    let _sweep_handle = bot_config
        .session_idle_timeout
        .map(|_| spawn_sweep_task(Arc::clone(&sessions), Duration::from_secs(60)));

    let sender = Arc::new(
        WhatsAppSender::new(whatsapp_config.clone()).context("building WhatsApp sender")?,
    );
    let engine = ConversationEngine::new(catalog, Replies::new(&bot_config.business_name));
    let bot = Arc::new(LeadBot::new(
        sessions,
        engine,
        sender,
        leads,
        bot_config.dedup_capacity,
    ));

    if server_config.verify_token.is_none() {
        tracing::warn!("WHATSAPP_VERIFY_TOKEN not set; webhook verification will be rejected");
    }

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);
    let app = webhook_routes(WebhookState {
        bot,
        verify_token: server_config.verify_token.clone(),
    })
    .layer(cors);

    let addr = server_config.listen_addr();
    eprintln!("📇 Lead Assist v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("   Business: {}", bot_config.business_name);
    eprintln!("   Phone number id: {}", whatsapp_config.phone_number_id);
    eprintln!("   Webhook: http://{}/webhooks/whatsapp", addr);
    eprintln!("   Health:  http://{}/health", addr);
    eprintln!("   Leads stored: {}\n", stored_leads);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("binding {addr}"))?;
    tracing::info!(addr = %addr, "Webhook server started");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("webhook server failed")?;

    tracing::info!("Shut down");
    Ok(())
}

fn exit_with(e: &dyn std::error::Error) -> ! {
    eprintln!("Error: {e}");
    std::process::exit(1);
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
    }
}
