// Copyright: Metro Conquest organisers
// Removal of the attribution is not allowed

use actix_cors::Cors;
use actix_web::{App, HttpServer, middleware, web};
use anyhow::Context;
use clap::Parser;
use metroquest::feed::HttpFeed;
use metroquest::local_data::LocalData;
use metroquest::postgres_tools::make_async_pool;
use metroquest::store::{MemoryGameStore, PgGameStore, Storage};
use metroquest::{GameConfig, GameCore, MetroSystem};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

mod api;

#[cfg(not(target_env = "msvc"))]
use tikv_jemallocator::Jemalloc;

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Game configuration file
    #[arg(long, default_value = "data/game_config.json")]
    config: PathBuf,
    /// Overrides `data_dir` from the configuration file
    #[arg(long)]
    data_dir: Option<PathBuf>,
    #[command(subcommand)]
    cmd: Command,
}

#[derive(clap::Subcommand, Debug)]
enum Command {
    /// Build the metro network and serve the game over HTTP
    Serve {
        #[arg(short, long, default_value = "127.0.0.1")]
        address: String,
        #[arg(short, long, default_value_t = 8080)]
        port: u16,
    },
    /// Build the metro network and write the adjacency graph to a file
    Snapshot {
        #[arg(short, long, default_value = "graph.json")]
        output: PathBuf,
    },
}

fn load_config(path: &Path, data_dir: Option<PathBuf>) -> anyhow::Result<GameConfig> {
    let mut config = if path.exists() {
        GameConfig::from_path(path)?
    } else {
        warn!("{} not found, running with the default configuration", path.display());
        GameConfig::default()
    };

    if let Some(data_dir) = data_dir {
        config.data_dir = data_dir;
    }

    Ok(config)
}

async fn build_metro(config: &GameConfig) -> anyhow::Result<MetroSystem> {
    let mut local = LocalData::load_from_dir(&config.data_dir)?;
    let feed = HttpFeed::new(&config.sources)?;

    let metro = MetroSystem::build(config, &mut local, &feed)
        .await
        .context("metro network could not be built")?;

    Ok(metro)
}

async fn open_storage() -> anyhow::Result<Storage> {
    match std::env::var("DATABASE_URL") {
        Ok(database_url) => {
            let pool = make_async_pool(&database_url)
                .await
                .map_err(|e| anyhow::anyhow!("could not connect to postgres: {}", e))?;
            info!("Persisting game state to postgres");
            Ok(Storage::Postgres(PgGameStore::new(Arc::new(pool))))
        }
        Err(_) => {
            warn!("DATABASE_URL not set, game state only lives in memory");
            Ok(Storage::Memory(MemoryGameStore::default()))
        }
    }
}

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    let args = Args::parse();
    let config = load_config(&args.config, args.data_dir)?;

    match args.cmd {
        Command::Snapshot { output } => {
            let metro = build_metro(&config).await?;
            std::fs::write(&output, metro.graph_snapshot()?)
                .with_context(|| format!("could not write {}", output.display()))?;
            info!(
                "Wrote {} stations to {}",
                metro.graph.len(),
                output.display()
            );
            Ok(())
        }
        Command::Serve { address, port } => {
            let metro = build_metro(&config).await?;
            let storage = Arc::new(open_storage().await?);
            let save_interval = Duration::from_secs(config.save_interval_secs.max(1));

            let core = Arc::new(GameCore::new(config, metro));
            core.load_all(storage.as_ref()).await?;

            {
                let core = Arc::clone(&core);
                let storage = Arc::clone(&storage);
                actix_web::rt::spawn(async move {
                    let mut interval = tokio::time::interval(save_interval);
                    // the first tick fires immediately, state was just loaded
                    interval.tick().await;
                    loop {
                        interval.tick().await;
                        if let Err(e) = core.save_all(storage.as_ref()).await {
                            error!("Periodic save failed: {}", e);
                        }
                    }
                });
            }

            info!("Starting turnstile on {}:{}", address, port);

            let server_core = Arc::clone(&core);
            let server_storage = Arc::clone(&storage);
            HttpServer::new(move || {
                App::new()
                    .wrap(Cors::permissive())
                    .wrap(middleware::Compress::default())
                    .app_data(web::Data::new(Arc::clone(&server_core)))
                    .app_data(web::Data::new(Arc::clone(&server_storage)))
                    .configure(api::config)
            })
            .bind((address, port))?
            .run()
            .await?;

            info!("Shutting down, saving game state");
            core.save_all(storage.as_ref()).await?;
            Ok(())
        }
    }
}
