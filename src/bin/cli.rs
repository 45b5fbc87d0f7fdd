// VAYMN - Library Mirror Core
// Copyright (C) 2025 VAYMN contributors
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.


use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use vaymn_core::storage::queries;
use vaymn_core::{Mirror, MirrorConfig};

#[derive(Parser)]
#[command(name = "vaymn-cli")]
#[command(about = "VAYMN CLI - inspect and repair the local mirror", long_about = None)]
struct Cli {
    /// Local mirror database (overrides VAYMN_DATABASE_PATH)
    #[arg(long, global = true)]
    database: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum CollectionArg {
    Books,
    Users,
    Admins,
}

#[derive(Subcommand)]
enum Commands {
    /// Show configuration, connectivity and local entries
    Status,
    /// Seed the remote store if its catalog is empty
    Seed,
    /// Overwrite both stores with the bootstrap data set
    ForceSeed,
    /// Print a collection (remote first, local fallback)
    List {
        #[arg(value_enum)]
        collection: CollectionArg,
    },
    /// Write vaymn_backup.json into a directory
    Export {
        #[arg(default_value = ".")]
        dir: PathBuf,
    },
    /// Replace the local collections with a backup file
    Import { file: PathBuf },
    /// Clear all local state
    Reset,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "vaymn_core=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    let mut config = MirrorConfig::from_env().context("loading configuration")?;
    if let Some(path) = cli.database {
        config.database_path = path;
    }
    let mirror = Mirror::open(&config).await.context("opening local mirror")?;

    match cli.command {
        Commands::Status => {
            println!("Database: {}", config.database_path.display());
            println!(
                "Integrity: {}",
                if mirror.database().check_integrity().await? { "ok" } else { "FAILED" }
            );
            match &config.remote {
                Some(remote) => {
                    let reachable = mirror.test_cloud_connection().await;
                    println!(
                        "Cloud: {} ({})",
                        remote.url,
                        if reachable { "reachable" } else { "unreachable" }
                    );
                }
                None => println!("Cloud: not configured (local mode)"),
            }
            for (key, updated_at) in queries::list_entries(mirror.database().pool()).await? {
                println!("  {:<14} updated {}", key, updated_at);
            }
            match mirror.get_current_user().await? {
                Some(user) => println!("Session: {} ({})", user.name, user.library_id),
                None => println!("Session: none"),
            }
        }
        Commands::Seed => {
            if !mirror.is_cloud_enabled() {
                println!("Cloud not configured; nothing to seed");
            } else {
                mirror.seed_if_empty().await;
                println!("Seed check complete");
            }
        }
        Commands::ForceSeed => {
            let collections = mirror.force_seed().await?;
            println!(
                "Reseeded {} books, {} users, {} admins",
                collections.books.len(),
                collections.users.len(),
                collections.admins.len()
            );
        }
        Commands::List { collection } => {
            let rows = match collection {
                CollectionArg::Books => serde_json::to_string_pretty(&mirror.get_books().await)?,
                CollectionArg::Users => serde_json::to_string_pretty(&mirror.get_users().await)?,
                CollectionArg::Admins => serde_json::to_string_pretty(&mirror.get_admins().await)?,
            };
            println!("{}", rows);
        }
        Commands::Export { dir } => {
            let path = mirror.export_full_database(&dir).await?;
            println!("Exported to {}", path.display());
        }
        Commands::Import { file } => {
            let content = tokio::fs::read_to_string(&file)
                .await
                .with_context(|| format!("reading {}", file.display()))?;
            if mirror.import_database(&content).await? {
                println!("Imported {}", file.display());
            } else {
                anyhow::bail!("{} is not a valid VAYMN backup", file.display());
            }
        }
        Commands::Reset => {
            mirror.factory_reset().await?;
            println!("Local mirror cleared");
        }
    }

    mirror.database().clone().close().await?;
    Ok(())
}
