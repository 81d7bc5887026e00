use forge_server::{Service, ServerConfig, build_federation, serve};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let Some(config_path) = std::env::args_os().nth(1).map(PathBuf::from) else {
        eprintln!("usage: forge-server <config.json>");
        return ExitCode::from(2);
    };

    let federation = match ServerConfig::load(&config_path).and_then(|c| build_federation(&c)) {
        Ok(federation) => federation,
        Err(e) => {
            tracing::error!(error = %e, config = %config_path.display(), "startup failed");
            return ExitCode::FAILURE;
        }
    };

    let service = Arc::new(Service::new(Arc::new(federation)));
    match serve(service, tokio::io::stdin(), tokio::io::stdout()).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "stdio transport failed");
            ExitCode::FAILURE
        }
    }
}
