mod config;
mod export_file;
mod logging;
mod models;
mod ports;
mod rekordbox;
mod services;
mod spotify_rs;
#[cfg(test)]
mod test_utils;

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Parser, Subcommand};
use color_eyre::{
    Result,
    eyre::{Context, eyre},
};

use crate::{
    config::{Config, Overrides, RunConfig},
    logging::{init_tracing, shutdown_tracing},
    models::{PlaylistKind, Track},
    ports::catalog::Catalog,
    ports::spotify::PlaylistMutation,
    rekordbox::RekordboxDb,
    services::{
        hierarchy::{PlaylistNode, PlaylistTree, build_hierarchy},
        matching::{MatchEngine, MatchReport},
        sync::SyncEngine,
        track_loader::load_tracks,
    },
    spotify_rs::client::SpotifyClient,
};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// The config file to use
    #[arg(short, long, global = true, env = "REKORDBOX_SYNC_CONFIG")]
    config: Option<PathBuf>,

    /// Path to rekordbox's master.db
    #[arg(long, global = true, env = "REKORDBOX_DB")]
    db: Option<PathBuf>,

    /// Log filter, e.g. `info` or `rekordbox_sync=debug`
    #[arg(long, default_value = "warn", global = true, env = "LOG_LEVEL")]
    log_level: String,

    /// Export spans to this OTLP (gRPC) endpoint
    #[arg(long, global = true, env = "OTEL_EXPORTER_OTLP_ENDPOINT")]
    otlp_endpoint: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Print the playlist hierarchy
    Tree,
    /// Print the tracks of a playlist
    Tracks {
        /// Playlist id, `/`-separated path or name; a file path with --from-file
        source: String,

        /// Read the tracks from a playlist exported by rekordbox
        #[arg(long)]
        from_file: bool,
    },
    /// Copy a playlist to Spotify
    Sync {
        /// Name of the Spotify playlist, created if missing
        name: String,

        /// Playlist id, `/`-separated path or name; a file path with --from-file
        source: String,

        /// Read the tracks from a playlist exported by rekordbox
        #[arg(long)]
        from_file: bool,

        /// Search and print matches without touching any playlist
        #[arg(long)]
        dry_run: bool,

        /// Tracks per add request (1-100)
        #[arg(long)]
        batch_size: Option<usize>,

        /// Spotify user access token
        #[arg(long, env = "SPOTIFY_ACCESS_TOKEN", hide_env_values = true)]
        access_token: String,
    },
    /// Print the database schema
    Schema,
    #[command(subcommand)]
    Config(ConfigCommands),
}

#[derive(Subcommand, Debug)]
enum ConfigCommands {
    /// Create a default config file, if it doesn't exist
    CreateDefault,
    /// Print the path to the config file
    Path,
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;

    let args = Args::parse();
    let tracer_provider = init_tracing(
        env!("CARGO_PKG_NAME"),
        args.otlp_endpoint.as_deref(),
        &args.log_level,
    )?;

    let result = run(args).await;
    shutdown_tracing(tracer_provider);
    result
}

fn run_config_command(command: ConfigCommands, config: Option<PathBuf>) -> Result<()> {
    match command {
        ConfigCommands::CreateDefault => {
            let path = config
                .or_else(Config::config_path)
                .ok_or_else(|| eyre!("No default config path found"))?;
            tracing::debug!("Creating default config at {}", path.display());
            if Config::create_default_at(&path)? {
                println!("Created {}", path.display());
            } else {
                println!("{} already exists", path.display());
            }
        }
        ConfigCommands::Path => match Config::config_path() {
            Some(path) => println!("{}", path.display()),
            None => println!("No default config path found"),
        },
    }
    Ok(())
}

async fn run(args: Args) -> Result<()> {
    let command = match args.command {
        Commands::Config(config_commands) => {
            return run_config_command(config_commands, args.config);
        }
        command => command,
    };

    tracing::debug!("Loading configuration");
    let config = {
        if let Some(config) = &args.config {
            Config::from_file(config)
        } else {
            Config::load()
        }
    }
    .wrap_err("Failed to load rekordbox-sync config")?;

    let overrides = match &command {
        Commands::Sync {
            dry_run,
            batch_size,
            ..
        } => Overrides {
            database: args.db.clone(),
            batch_size: *batch_size,
            dry_run: *dry_run,
        },
        _ => Overrides {
            database: args.db.clone(),
            ..Default::default()
        },
    };
    let run_config = config.resolve(overrides)?;

    match command {
        Commands::Tree => {
            let db = open_catalog(&run_config)?;
            let tree = build_hierarchy(db.playlist_rows()?)?;
            let counts = db.playlist_track_counts()?;
            for line in format_tree(&tree, &counts) {
                println!("{line}");
            }
            if tree.is_empty() {
                println!("No playlists");
            } else {
                println!("{} playlists and folders", tree.len());
            }
        }
        Commands::Tracks { source, from_file } => {
            for track in source_tracks(&run_config, &source, from_file)? {
                println!("{} - {}", track.artist, track.title);
            }
        }
        Commands::Sync {
            name,
            source,
            from_file,
            access_token,
            ..
        } => {
            let tracks = source_tracks(&run_config, &source, from_file)?;
            sync_tracks(&run_config, &name, &tracks, access_token).await?;
        }
        Commands::Schema => {
            let db = open_catalog(&run_config)?;
            for object in db.dump_schema()? {
                println!("{object}");
            }
        }
        Commands::Config(_) => {}
    }

    Ok(())
}

fn open_catalog(run_config: &RunConfig) -> Result<RekordboxDb> {
    RekordboxDb::open(&run_config.database, &run_config.database_key)
}

fn source_tracks(run_config: &RunConfig, source: &str, from_file: bool) -> Result<Vec<Track>> {
    if from_file {
        return export_file::read_tracks(Path::new(source));
    }

    let db = open_catalog(run_config)?;
    let tree = build_hierarchy(db.playlist_rows()?)?;
    let node = find_source(&tree, source)?;
    let id = node
        .id()
        .ok_or_else(|| eyre!("'{}' does not name a playlist", source))?;

    match node.kind() {
        Some(PlaylistKind::Folder) => {
            return Err(eyre!("'{}' is a folder, not a playlist", node.display_path()));
        }
        Some(PlaylistKind::SmartPlaylist) => tracing::warn!(
            playlist = %node.display_path(),
            "Smart playlists have no stored tracks; export it to a file and use --from-file"
        ),
        _ => {}
    }

    load_tracks(&db, id)
}

/// Find a playlist by id, then by `/`-separated path, then by name. A name
/// shared by several playlists is an error.
fn find_source<'a>(tree: &'a PlaylistTree, source: &str) -> Result<&'a PlaylistNode> {
    if let Some(node) = tree
        .find_by_id(source)
        .or_else(|| tree.find_by_path(source))
    {
        return Ok(node);
    }

    match tree.find_by_name(source).as_slice() {
        [] => Err(eyre!("No playlist matches '{}'", source)),
        [node] => Ok(*node),
        nodes => {
            let paths: Vec<String> = nodes.iter().map(|n| n.display_path()).collect();
            Err(eyre!(
                "'{}' is ambiguous, use a path: {}",
                source,
                paths.join(", ")
            ))
        }
    }
}

fn format_tree(tree: &PlaylistTree, counts: &HashMap<String, usize>) -> Vec<String> {
    tree.iter()
        .map(|(depth, node)| {
            let indent = "  ".repeat(depth);
            let id = node.id().unwrap_or_default();
            match node.kind() {
                Some(PlaylistKind::Folder) => format!("{indent}{}/ [{id}]", node.name()),
                kind => {
                    let mut line = format!(
                        "{indent}{} [{id}] {} ({} tracks)",
                        node.name(),
                        kind.unwrap_or_default().label(),
                        counts.get(id).copied().unwrap_or(0)
                    );
                    if let Some(created_at) = node.row.as_ref().and_then(|row| row.created_at) {
                        line.push_str(&format!(", created {}", created_at.date()));
                    }
                    line
                }
            }
        })
        .collect()
}

fn format_matches(tracks: &[Track], report: &MatchReport) -> Vec<String> {
    report
        .tracks
        .iter()
        .map(|slot| {
            let local = &tracks[slot.source_index];
            let remote = if slot.is_resolved() {
                slot.remote_display_name.as_str()
            } else {
                "(not found)"
            };
            format!("{} - {} -> {}", local.artist, local.title, remote)
        })
        .collect()
}

async fn sync_tracks(
    run_config: &RunConfig,
    name: &str,
    tracks: &[Track],
    access_token: String,
) -> Result<()> {
    let client = Arc::new(SpotifyClient::new(access_token));

    let matcher = MatchEngine::new(Arc::clone(&client), &run_config.match_settings);
    let report = matcher.resolve(tracks).await;

    if run_config.dry_run {
        for line in format_matches(tracks, &report) {
            println!("{line}");
        }
        println!(
            "{} of {} tracks found, {} not found",
            report.resolved_count(),
            report.len(),
            report.unresolved_count()
        );
        return Ok(());
    }

    for slot in report.unresolved() {
        let local = &tracks[slot.source_index];
        println!("Not found: {} - {}", local.artist, local.title);
    }

    let user = client
        .current_user()
        .await
        .wrap_err("Failed to fetch the current Spotify user")?;
    tracing::info!(
        user_id = %user.id,
        display_name = user.display_name.as_deref().unwrap_or_default(),
        "Syncing as Spotify user"
    );
    let syncer = SyncEngine::new(client, run_config.sync_settings.clone());
    let playlist = syncer.resolve_target(&user.id, name).await?;
    let sync_report = syncer.apply(&playlist.id, &report.tracks).await;

    println!(
        "{}: {} added, {} failed, {} not found ({} of {} batches failed)",
        playlist.name,
        sync_report.added,
        sync_report.failed_to_add,
        sync_report.not_added,
        sync_report.failed_batches,
        sync_report.batches
    );

    if sync_report.failed_batches > 0 {
        return Err(eyre!(
            "{} of {} batches could not be added",
            sync_report.failed_batches,
            sync_report.batches
        ));
    }
    Ok(())
}
