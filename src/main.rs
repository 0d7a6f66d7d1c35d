use anyhow::{Context, Result};
use futures::StreamExt;
use std::{path::Path, sync::Arc};
use swiftfs::{
    client::{RackResolver, TableRackResolver},
    config::{AppConfig, Command},
    models::SwiftPath,
    services::{LocalStore, SwiftFileSystemStore, Throttle},
};
use tokio::{fs, io::AsyncWriteExt};
use tokio_util::{io::ReaderStream, sync::CancellationToken};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    // --- Logging setup ---
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    // --- Parse config + command ---
    let (cfg, command) = AppConfig::from_env_and_args()?;

    tracing::info!("Starting swiftfs with config: {:?}", cfg);

    // --- Ensure storage directory exists ---
    if !Path::new(&cfg.storage_dir).exists() {
        fs::create_dir_all(&cfg.storage_dir).await?;
        tracing::info!("Created storage directory at {}", cfg.storage_dir);
    }

    // --- Ensure the metadata database directory exists ---
    let db_path = cfg
        .database_url
        .trim_start_matches("sqlite://")
        .trim_start_matches("file:");
    tracing::debug!("Interpreted SQLite path => {}", db_path);
    if let Some(parent) = Path::new(db_path).parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            fs::create_dir_all(parent).await?;
            tracing::info!("Created missing directory {:?}", parent);
        }
    }

    let client = LocalStore::connect(&cfg.database_url, &cfg.storage_dir)
        .await
        .with_context(|| format!("opening local store at {}", cfg.database_url))?;

    let racks: Arc<dyn RackResolver> = match &cfg.rack_table {
        Some(path) => Arc::new(
            TableRackResolver::load(path)
                .await
                .with_context(|| format!("loading rack table {}", path))?,
        ),
        None => Arc::new(TableRackResolver::default()),
    };

    // --- Ctrl-C stops bulk operations at the next throttle pause ---
    let cancel = CancellationToken::new();
    let shutdown = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupt received, stopping");
            shutdown.cancel();
        }
    });

    let settings = cfg.settings();
    let throttle = Throttle::with_cancellation(settings.throttle_delay, cancel);
    let store = SwiftFileSystemStore::new(&cfg.root_uri, Arc::new(client), racks, settings)?
        .with_throttle(throttle);
    tracing::debug!("Filesystem ready: {:?}", store);

    run(&store, command).await
}

async fn run(store: &SwiftFileSystemStore, command: Command) -> Result<()> {
    match command {
        Command::Stat { path } => {
            let status = store.get_object_metadata(&parse_path(&path)?).await?;
            println!("{status}");
        }
        Command::Ls { path, recursive } => {
            for status in store
                .list_sub_paths(&parse_path(&path)?, recursive, true)
                .await?
            {
                println!("{status}");
            }
        }
        Command::Mkdir { path } => {
            store.create_directory(&parse_path(&path)?).await?;
        }
        Command::Put { local, path } => {
            let file = fs::File::open(&local)
                .await
                .with_context(|| format!("opening {}", local))?;
            let length = file.metadata().await?.len();
            store
                .upload_file(&parse_path(&path)?, ReaderStream::new(file).boxed(), length)
                .await?;
            tracing::info!("Uploaded {} bytes to {}", length, path);
        }
        Command::Cat { path } => {
            let mut data = store.get_object(&parse_path(&path)?).await?;
            let mut stdout = tokio::io::stdout();
            while let Some(chunk) = data.next().await {
                stdout.write_all(&chunk?).await?;
            }
            stdout.flush().await?;
        }
        Command::Mv { src, dst } => {
            store.rename(&parse_path(&src)?, &parse_path(&dst)?).await?;
        }
        Command::Rm { path, recursive } => {
            store.delete(&parse_path(&path)?, recursive).await?;
        }
    }
    Ok(())
}

fn parse_path(input: &str) -> Result<SwiftPath> {
    SwiftPath::parse(input).with_context(|| format!("invalid path `{}`", input))
}
