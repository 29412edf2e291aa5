//! Server: loads config, starts schema discovery, waits for the table list, and serves
//! the generated routes.

use mysql_autorest::{Backend, BackendConfig};
use serde_json::Value;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("mysql_autorest=info,tower_http=info")),
        )
        .init();

    let config = match std::env::var("AUTOREST_CONFIG") {
        Ok(path) => BackendConfig::from_json_file(path).await?,
        Err(_) => BackendConfig::from_env()?,
    };
    let backend = Backend::connect(config);

    let schema = backend.schema().clone();
    let tables = schema.wait_for_listing().await?;
    for table in &tables {
        for op in ["post", "put"] {
            let event = format!("{}-{}", op, table);
            let name = event.clone();
            backend.on(event, move |result: &Value| {
                tracing::info!(event = %name, result = %result, "mutation");
            });
        }
    }

    let app = backend.start().await?.layer(TraceLayer::new_for_http());

    let addr = std::env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".into());
    let listener = TcpListener::bind(&addr).await?;
    tracing::info!("listening on {}", listener.local_addr()?);
    axum::serve(listener, app).await?;
    Ok(())
}
