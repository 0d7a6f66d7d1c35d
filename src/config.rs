use crate::services::{DEFAULT_BLOCKSIZE_KB, StoreSettings};
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::{env, str::FromStr, time::Duration};

/// Centralized application configuration.
/// Combines environment variables and CLI arguments.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub root_uri: String,
    pub throttle_delay_ms: u64,
    pub block_size_kb: u64,
    pub storage_dir: String,
    pub database_url: String,
    pub local_host: String,
    pub rack_table: Option<String>,
}

/// Command-line + environment configuration.
#[derive(Parser, Debug)]
#[command(author, version, about = "Filesystem view over a Swift-style object store")]
pub struct Args {
    /// Filesystem root, `swift://<container>.<service>/` (overrides SWIFTFS_ROOT_URI)
    #[arg(long, global = true)]
    pub root_uri: Option<String>,

    /// Pause between mutating requests in bulk operations (overrides SWIFTFS_THROTTLE_DELAY_MS)
    #[arg(long, global = true)]
    pub throttle_delay_ms: Option<u64>,

    /// Block size reported for every entry, in KiB (overrides SWIFTFS_BLOCKSIZE_KB)
    #[arg(long, global = true)]
    pub block_size_kb: Option<u64>,

    /// Directory where object payloads are stored (overrides SWIFTFS_STORAGE_DIR)
    #[arg(long, global = true)]
    pub storage_dir: Option<String>,

    /// Metadata database URL (overrides SWIFTFS_DATABASE_URL)
    #[arg(long, global = true)]
    pub database_url: Option<String>,

    /// Address of this host for replica ranking (overrides SWIFTFS_LOCAL_HOST)
    #[arg(long, global = true)]
    pub local_host: Option<String>,

    /// File of `host /rack/path` lines (overrides SWIFTFS_RACK_TABLE)
    #[arg(long, global = true)]
    pub rack_table: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Print the status of a path
    Stat { path: String },
    /// List the children of a directory
    Ls {
        path: String,
        #[arg(short, long)]
        recursive: bool,
    },
    /// Create a directory marker
    Mkdir { path: String },
    /// Upload a local file
    Put { local: String, path: String },
    /// Write an object to stdout
    Cat { path: String },
    /// Rename a file or directory
    Mv { src: String, dst: String },
    /// Delete a file or directory
    Rm {
        path: String,
        #[arg(short, long)]
        recursive: bool,
    },
}

impl AppConfig {
    /// Parse environment variables + CLI args into AppConfig and the command.
    pub fn from_env_and_args() -> Result<(Self, Command)> {
        // Parse CLI once
        Self::from_args(Args::parse())
    }

    pub fn from_args(args: Args) -> Result<(Self, Command)> {
        // --- Environment fallback ---
        let env_root =
            env::var("SWIFTFS_ROOT_URI").unwrap_or_else(|_| "swift://data.local/".into());
        let env_throttle = env_number("SWIFTFS_THROTTLE_DELAY_MS", 0)?;
        let env_block_size = env_number("SWIFTFS_BLOCKSIZE_KB", DEFAULT_BLOCKSIZE_KB)?;
        let env_storage =
            env::var("SWIFTFS_STORAGE_DIR").unwrap_or_else(|_| "./data/objects".into());
        let env_db = env::var("SWIFTFS_DATABASE_URL")
            .unwrap_or_else(|_| "sqlite://./data/meta/swiftfs.db".into());
        let env_host = env::var("SWIFTFS_LOCAL_HOST").unwrap_or_else(|_| "127.0.0.1".into());
        let env_racks = env::var("SWIFTFS_RACK_TABLE").ok();

        // --- Merge ---
        let cfg = Self {
            root_uri: args.root_uri.unwrap_or(env_root),
            throttle_delay_ms: args.throttle_delay_ms.unwrap_or(env_throttle),
            block_size_kb: args.block_size_kb.unwrap_or(env_block_size),
            storage_dir: args.storage_dir.unwrap_or(env_storage),
            database_url: args.database_url.unwrap_or(env_db),
            local_host: args.local_host.unwrap_or(env_host),
            rack_table: args.rack_table.or(env_racks),
        };

        Ok((cfg, args.command))
    }

    pub fn settings(&self) -> StoreSettings {
        StoreSettings {
            block_size_kb: self.block_size_kb,
            throttle_delay: Duration::from_millis(self.throttle_delay_ms),
            local_host: self.local_host.clone(),
        }
    }
}

fn env_number<T>(name: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(name) {
        Ok(value) => value
            .parse::<T>()
            .with_context(|| format!("parsing {} value `{}`", name, value)),
        Err(env::VarError::NotPresent) => Ok(default),
        Err(err) => Err(err).with_context(|| format!("reading {}", name)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_flags_win_and_feed_settings() {
        let args = Args::try_parse_from([
            "swiftfs",
            "--root-uri",
            "swift://logs.cluster/",
            "--throttle-delay-ms",
            "250",
            "--block-size-kb",
            "64",
            "--local-host",
            "10.1.0.7",
            "stat",
            "/a",
        ])
        .unwrap();
        let (cfg, command) = AppConfig::from_args(args).unwrap();
        assert_eq!(cfg.root_uri, "swift://logs.cluster/");
        assert_eq!(command, Command::Stat { path: "/a".into() });

        let settings = cfg.settings();
        assert_eq!(settings.throttle_delay, Duration::from_millis(250));
        assert_eq!(settings.block_size_kb, 64);
        assert_eq!(settings.local_host, "10.1.0.7");
    }

    #[test]
    fn subcommands_take_their_flags() {
        let args = Args::try_parse_from(["swiftfs", "rm", "-r", "/dir"]).unwrap();
        assert_eq!(
            args.command,
            Command::Rm {
                path: "/dir".into(),
                recursive: true
            }
        );

        let args =
            Args::try_parse_from(["swiftfs", "mv", "/a", "/b", "--throttle-delay-ms", "5"]).unwrap();
        assert_eq!(args.throttle_delay_ms, Some(5));
        assert!(matches!(args.command, Command::Mv { .. }));
    }

    #[test]
    fn missing_subcommand_is_rejected() {
        assert!(Args::try_parse_from(["swiftfs"]).is_err());
    }
}
