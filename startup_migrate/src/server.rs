//! HTTP listener started once the databases are up.
//!
//! Every request, whatever its method or path, gets the configured greeting.

use axum::Router;
use tokio::net::TcpListener;

use crate::config::ServerConfig;
use crate::error::Result;

pub fn router(greeting: String) -> Router {
    Router::new().fallback(move || {
        let greeting = greeting.clone();
        async move { greeting }
    })
}

/// Bind and serve until the process stops
pub async fn serve(config: &ServerConfig) -> Result<()> {
    let listener = TcpListener::bind(&config.bind_address).await?;
    tracing::info!(address = %config.bind_address, "Listening");
    axum::serve(listener, router(config.greeting.clone())).await?;
    Ok(())
}
