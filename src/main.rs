use clap::Parser;
use color_eyre::Result;
use rfid_gateway::{
    cli::{self, Commands, Examples},
    config::Config,
    logging,
    responses::StateResponse,
    server,
    tags::TagsMessage,
};

#[cfg(unix)]
use tokio::signal::unix::{signal, SignalKind};

use tracing::{debug, info};

fn show_example(example: Examples) -> Result<()> {
    let shown = match example {
        Examples::Config => Config::example().serialize_pretty()?,
        Examples::Tags => serde_json::to_string_pretty(&TagsMessage::example())?,
        Examples::State => serde_json::to_string_pretty(&StateResponse::example())?,
    };

    println!("{shown}");

    Ok(())
}

#[cfg(unix)]
async fn shutdown_signal() {
    let mut hangup = match signal(SignalKind::hangup()) {
        Ok(hangup) => hangup,
        Err(e) => {
            tracing::warn!(%e, "Can't listen for hangups");
            let _ = tokio::signal::ctrl_c().await;
            info!("Ctrl-C, quitting");
            return;
        }
    };

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("Ctrl-C, quitting")
        }
        _ = hangup.recv() => {
            info!("Told to hang up, quitting")
        }
    }
}

#[cfg(not(unix))]
async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    info!("Ctrl-C, quitting");
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;

    let cli = cli::Cli::parse();

    if let Some(Commands::Examples(example)) = cli.command {
        return show_example(example);
    }

    let file_logging = cli.log_dir.map(|dir| (cli.log_level, dir));
    logging::init(cli.log_level, file_logging).await;

    let config = if let Some(config_path) = cli.config {
        debug!(?config_path, "Config from path");
        Config::new_from_path(config_path)?
    } else {
        debug!("Default config");
        Config::default()
    };

    let port = cli.port.unwrap_or(config.server.port);

    server::run_on_port(config, port, shutdown_signal()).await?;

    info!("Bye");

    Ok(())
}
