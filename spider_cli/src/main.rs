#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(clippy::module_name_repetitions)]

mod cli;
mod run;

use clap::Parser;
use cli::{Cli, Commands, FILE_GUARD};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

fn init_logging(cli: &Cli, logging: &spider_config::Logging) {
    let level = logging.level.clone().unwrap_or_else(|| cli.log_level.clone());
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let console = if cli.json {
        tracing_subscriber::fmt::layer().json().boxed()
    } else {
        tracing_subscriber::fmt::layer().boxed()
    };

    let file_layer = logging.file.as_ref().map(|path| {
        let rotation = logging.rotation.as_deref().unwrap_or("never");
        let appender = match rotation {
            "daily" => tracing_appender::rolling::daily(".", path),
            "hourly" => tracing_appender::rolling::hourly(".", path),
            _ => tracing_appender::rolling::never(".", path),
        };
        let (writer, guard) = tracing_appender::non_blocking(appender);
        let _ = FILE_GUARD.set(guard);
        tracing_subscriber::fmt::layer()
            .json()
            .with_writer(writer)
            .boxed()
    });

    tracing_subscriber::registry()
        .with(filter)
        .with(console)
        .with(file_layer)
        .init();
}

fn main() -> eyre::Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();

    let cfg = run::load_config(&cli.config)?;
    init_logging(&cli, &cfg.logging);

    match &cli.cmd {
        Commands::Interact => run::interact(&cfg),
        Commands::Play { name } => run::play(&cfg, name),
        Commands::Animate { pose, duration_ms } => run::animate(&cfg, pose, *duration_ms),
        Commands::Home => run::home(&cfg),
        Commands::Off => run::off(&cfg),
        Commands::Position { channel } => run::position(&cfg, *channel),
        Commands::Moving => run::moving(&cfg),
        Commands::SelfCheck => run::self_check(&cfg),
    }
}
