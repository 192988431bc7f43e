//! Relay binary: forwards uploaded wildlife media to the hosted AI models.

use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;

use wildwatch_lib::ai::openai::OpenAiClient;
use wildwatch_lib::ai::AiProvider;
use wildwatch_lib::relay::{build_router, ensure_upload_dir, AppState};
use wildwatch_lib::settings::Settings;

#[derive(Parser, Debug)]
#[command(name = "wildwatch-relay", version, about = "Wildlife distress assessment relay")]
struct Args {
    /// Settings file (TOML)
    #[arg(short, long, env = "WILDWATCH_CONFIG")]
    config: Option<PathBuf>,

    /// Address to listen on, e.g. 0.0.0.0:3000
    #[arg(short, long)]
    bind: Option<String>,

    /// Directory for staged uploads
    #[arg(long)]
    upload_dir: Option<PathBuf>,

    /// Print the effective settings as TOML and exit
    #[arg(long)]
    dump_config: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    wildwatch_lib::init_logging();
    let args = Args::parse();

    let mut settings = Settings::load(args.config.as_deref())?;
    if let Some(bind) = args.bind {
        settings.relay.bind = bind;
    }
    if let Some(dir) = args.upload_dir {
        settings.relay.upload_dir = dir;
    }

    if args.dump_config {
        print!("{}", settings.to_toml()?);
        return Ok(());
    }

    if settings.provider.api_key.is_empty() {
        log::warn!("No API key configured; upstream calls will be rejected");
    }

    let config = settings.relay_config();
    ensure_upload_dir(&config).await?;

    let provider = Arc::new(OpenAiClient::new(&settings.provider_config()));
    log::info!(
        "Provider {} at {} (vision={}, transcription={})",
        provider.name(),
        settings.provider.endpoint,
        settings.provider.vision_model,
        settings.provider.transcription_model
    );

    let app = build_router(AppState::new(provider, config));

    let listener = tokio::net::TcpListener::bind(&settings.relay.bind).await?;
    log::info!("Backend running at http://{}", listener.local_addr()?);

    axum::serve(listener, app).await?;
    Ok(())
}
