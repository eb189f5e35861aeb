use std::sync::Arc;

use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use siphon::database::Database;
use siphon::interface::Interface;
use siphon::server;
use siphon::settings::Settings;
use siphon::{Result, SiphonError};

fn init_tracing(level: &str) {
    let filter = EnvFilter::try_new(level).unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .init();
}

async fn run(settings: Settings) -> Result<()> {
    let schema = std::fs::read_to_string(&settings.schema).map_err(|e| {
        SiphonError::Config(format!("cannot read schema {}: {}", settings.schema.display(), e))
    })?;
    let db = Arc::new(Database::new(&schema)?);
    let interface = Arc::new(Interface::new(db));
    let app = server::router(interface);

    let address = settings.address();
    let listener = tokio::net::TcpListener::bind(&address)
        .await
        .map_err(|e| SiphonError::Config(format!("cannot listen on {}: {}", address, e)))?;
    info!(%address, schema = %settings.schema.display(), "siphon listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown())
        .await
        .map_err(|e| SiphonError::Internal(format!("server error: {}", e)))?;
    info!("siphon stopped");
    Ok(())
}

async fn shutdown() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "cannot listen for ctrl-c");
    }
}

#[tokio::main]
async fn main() {
    let config_path = std::env::args().nth(1);
    let settings = match Settings::load(config_path.as_deref()) {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("{}", e);
            std::process::exit(1);
        }
    };
    init_tracing(&settings.log_level);
    if let Err(e) = run(settings).await {
        error!(kind = e.kind(), "{}", e);
        std::process::exit(1);
    }
}
