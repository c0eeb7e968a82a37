use tracing_subscriber::EnvFilter;

use video_relay_lib::config::AppConfig;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("video_relay_lib=info,tower_http=info")),
        )
        .init();

    let config = match AppConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            tracing::error!(error = %e, "invalid configuration");
            std::process::exit(2);
        }
    };

    if let Err(e) = video_relay_lib::run_server(config).await {
        tracing::error!(error = %e, "server stopped");
        std::process::exit(1);
    }
}
