//! scribe-server binary: the HTTP gateway in front of Google Drive.

use scribe_core::{TracingConfig, init_tracing};
use scribe_server::ServerConfig;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // A local .env is optional; real deployments set the environment.
    dotenvy::dotenv().ok();

    init_tracing(TracingConfig::gateway())?;

    let config = ServerConfig::from_env()?;
    scribe_server::serve(config).await?;

    Ok(())
}
