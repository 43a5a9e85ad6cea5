use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{anyhow, bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use inhouse_stats::api::routes::parse_ids;
use inhouse_stats::api::routes::refresh::{begin_refresh, run_refresh};
use inhouse_stats::api::state::AppState;
use inhouse_stats::calculate::{
    aggregate_players, candidates_by_mmr, compare_teams, head_to_head, parse_date_range,
    search_by_name, suggest_teammates, MatchFilter, MAX_ROSTER_SIZE,
};
use inhouse_stats::config::AppConfig;
use inhouse_stats::fetch::{source_from_config, MatchSource};
use inhouse_stats::models::{MatchFeed, PlayerId};
use inhouse_stats::parse_duration;

#[derive(Parser)]
#[command(name = "inhouse-stats")]
#[command(about = "Player statistics for in-house matchmaking queues")]
#[command(version)]
struct Cli {
    /// Path to configuration file
    #[arg(long, default_value = "./config.toml")]
    config: PathBuf,

    /// Log level (trace, debug, info, warn, error); overrides the config file
    #[arg(long)]
    log_level: Option<String>,

    /// Output logs as JSON
    #[arg(long)]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Options shared by every command that reads the feed.
#[derive(Args, Clone)]
struct QueryArgs {
    /// Window start (RFC 3339 or YYYY-MM-DD)
    #[arg(long)]
    from: Option<String>,

    /// Window end (RFC 3339 or YYYY-MM-DD, a bare date covers the whole day)
    #[arg(long)]
    to: Option<String>,

    /// Read matches from a JSON snapshot instead of the endpoint
    #[arg(long)]
    snapshot: Option<PathBuf>,

    /// Print JSON instead of text
    #[arg(long)]
    json: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the API server
    Serve {
        /// Bind address
        #[arg(long)]
        host: Option<String>,

        /// Port number
        #[arg(long)]
        port: Option<u16>,

        /// Reload the feed at this interval (e.g., "15m", "1h")
        #[arg(long)]
        refresh_every: Option<String>,

        /// Settle delay before recomputing the dashboard (e.g., "300ms")
        #[arg(long)]
        settle: Option<String>,

        /// Read matches from a JSON snapshot instead of the endpoint
        #[arg(long)]
        snapshot: Option<PathBuf>,
    },

    /// List player summaries
    Players {
        /// Case-insensitive name filter
        #[arg(long)]
        search: Option<String>,

        /// Maximum rows to print
        #[arg(long, default_value = "25")]
        limit: usize,

        #[command(flatten)]
        query: QueryArgs,
    },

    /// Pairwise record of two players
    HeadToHead {
        player1: String,
        player2: String,

        #[command(flatten)]
        query: QueryArgs,
    },

    /// Tally one roster against another
    Compare {
        /// Comma-separated player ids
        #[arg(long)]
        team1: String,

        /// Comma-separated player ids
        #[arg(long)]
        team2: String,

        #[command(flatten)]
        query: QueryArgs,
    },

    /// Suggest a teammate to add to team 1
    Suggest {
        /// Comma-separated player ids
        #[arg(long)]
        team1: String,

        /// Comma-separated player ids
        #[arg(long)]
        team2: String,

        /// Maximum suggestions to print
        #[arg(long, default_value = "10")]
        limit: usize,

        #[command(flatten)]
        query: QueryArgs,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let mut config = AppConfig::load_or_default(&cli.config)
        .with_context(|| format!("Failed to load {}", cli.config.display()))?;

    // Initialize tracing
    let level = cli.log_level.clone().unwrap_or_else(|| config.log_level.clone());
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&level));
    let registry = tracing_subscriber::registry().with(filter);
    if cli.json_logs {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }

    tracing::info!("Starting inhouse-stats v{}", env!("CARGO_PKG_VERSION"));

    match cli.command {
        Commands::Serve {
            host,
            port,
            refresh_every,
            settle,
            snapshot,
        } => {
            if let Some(host) = host {
                config.server.host = host;
            }
            if let Some(port) = port {
                config.server.port = port;
            }
            if let Some(settle) = settle {
                let delay = parse_duration(&settle)
                    .ok_or_else(|| anyhow!("Invalid --settle duration: {}", settle))?;
                config.engine.settle_ms = delay.as_millis() as u64;
            }
            if snapshot.is_some() {
                config.source.snapshot_path = snapshot;
            }
            config.validate()?;

            let source = source_from_config(&config.source)?;
            let feed = match source.load().await {
                Ok(feed) => feed,
                Err(e) => {
                    tracing::warn!(
                        "Initial load from {} failed, starting empty: {}",
                        source.describe(),
                        e
                    );
                    MatchFeed::new(Vec::new())
                }
            };

            let state = AppState::new(feed, source, config.engine.clone());

            if let Some(every) = refresh_every {
                let interval = parse_duration(&every)
                    .filter(|d| !d.is_zero())
                    .ok_or_else(|| anyhow!("Invalid --refresh-every interval: {}", every))?;
                let loop_state = state.clone();
                tokio::spawn(async move {
                    let mut ticker = tokio::time::interval(interval);
                    ticker.tick().await;
                    loop {
                        ticker.tick().await;
                        if begin_refresh(&loop_state).await.is_ok() {
                            run_refresh(loop_state.clone()).await;
                        } else {
                            tracing::debug!("Scheduled refresh skipped, one is already running");
                        }
                    }
                });
                tracing::info!("Reloading the feed every {:?}", interval);
            }

            let app = inhouse_stats::api::build_router(state, &config.server.cors_origin);
            let addr = format!("{}:{}", config.server.host, config.server.port);
            let listener = tokio::net::TcpListener::bind(&addr).await?;
            tracing::info!("Dashboard API: http://{}", addr);
            axum::serve(listener, app).await?;
        }
        Commands::Players {
            search,
            limit,
            query,
        } => {
            let (feed, filter) = load_for_query(&mut config, &query).await?;
            let stats = aggregate_players(&feed.matches, &filter);
            let found: Vec<_> = search_by_name(&stats, search.as_deref().unwrap_or_default())
                .into_iter()
                .take(limit)
                .collect();

            if query.json {
                print_json(&found)?;
            } else {
                println!(
                    "{:<24} {:>8} {:>6} {:>6} {:>8} {:>8} {:>9}",
                    "PLAYER", "MATCHES", "WINS", "LOSSES", "WIN %", "MMR", "AVG MMR"
                );
                for p in &found {
                    println!(
                        "{:<24} {:>8} {:>6} {:>6} {:>7.1}% {:>8.0} {:>9.0}",
                        truncate(&p.player_name, 24),
                        p.total_matches,
                        p.wins,
                        p.losses,
                        p.win_rate,
                        p.mmr,
                        p.average_mmr
                    );
                }
                println!("{} of {} players", found.len(), stats.len());
            }
        }
        Commands::HeadToHead {
            player1,
            player2,
            query,
        } => {
            if player1 == player2 {
                bail!("Head-to-head needs two different players");
            }
            let (feed, filter) = load_for_query(&mut config, &query).await?;
            let stats = head_to_head(
                &feed.matches,
                &PlayerId::from(player1),
                &PlayerId::from(player2),
                &filter,
            );

            if query.json {
                print_json(&stats)?;
            } else {
                println!("{} vs {}", stats.player1_id, stats.player2_id);
                println!("  Matches together: {}", stats.matches_with_both);
                println!(
                    "  Same side:        {}W {}L ({:.1}%)",
                    stats.player1_wins_with_player2,
                    stats.player1_loses_with_player2,
                    stats.win_rate_with
                );
                println!(
                    "  Opposing sides:   {}W {}L ({:.1}%)",
                    stats.player1_wins_against_player2,
                    stats.player1_losses_against_player2,
                    stats.win_rate_against
                );
            }
        }
        Commands::Compare {
            team1,
            team2,
            query,
        } => {
            let (team1, team2) = rosters(&team1, &team2)?;
            let (feed, filter) = load_for_query(&mut config, &query).await?;
            let result = compare_teams(&feed.matches, &team1, &team2, &filter);

            if query.json {
                print_json(&result)?;
            } else {
                println!("{} vs {}", join_ids(&team1), join_ids(&team2));
                println!("  Games:       {}", result.total_games);
                println!(
                    "  Team 1 wins: {} ({:.1}%)",
                    result.team1_wins,
                    result.team1_win_rate()
                );
                println!("  Team 2 wins: {}", result.team2_wins);
            }
        }
        Commands::Suggest {
            team1,
            team2,
            limit,
            query,
        } => {
            let (team1, team2) = rosters(&team1, &team2)?;
            let (feed, filter) = load_for_query(&mut config, &query).await?;
            let players = aggregate_players(&feed.matches, &filter);
            let candidates = candidates_by_mmr(players.values());
            let mut suggestions =
                suggest_teammates(&feed.matches, &candidates, &team1, &team2, &filter);
            suggestions.truncate(limit);

            if query.json {
                print_json(&suggestions)?;
            } else if suggestions.is_empty() {
                println!("No candidate has played this match-up");
            } else {
                println!(
                    "{:<24} {:>6} {:>6} {:>8}",
                    "CANDIDATE", "GAMES", "WINS", "WIN %"
                );
                for s in &suggestions {
                    println!(
                        "{:<24} {:>6} {:>6} {:>7.1}%",
                        truncate(&s.player_name, 24),
                        s.result.total_games,
                        s.result.team1_wins,
                        s.win_rate
                    );
                }
            }
        }
    }

    Ok(())
}

/// Load the feed and build the filter for a one-shot query.
async fn load_for_query(config: &mut AppConfig, query: &QueryArgs) -> Result<(MatchFeed, MatchFilter)> {
    if query.snapshot.is_some() {
        config.source.snapshot_path = query.snapshot.clone();
    }
    config.validate()?;

    let range = parse_date_range(query.from.as_deref(), query.to.as_deref())?;
    let source: Arc<dyn MatchSource> = source_from_config(&config.source)?;
    let feed = source
        .load()
        .await
        .with_context(|| format!("Failed to load matches from {}", source.describe()))?;

    Ok((feed, config.engine.filter(range)))
}

fn rosters(team1: &str, team2: &str) -> Result<(Vec<PlayerId>, Vec<PlayerId>)> {
    let team1 = parse_ids(Some(team1));
    let team2 = parse_ids(Some(team2));
    if team1.is_empty() || team2.is_empty() {
        bail!("Both rosters need at least one player");
    }
    if team1.len() > MAX_ROSTER_SIZE || team2.len() > MAX_ROSTER_SIZE {
        bail!("Rosters are limited to {} players", MAX_ROSTER_SIZE);
    }
    if let Some(shared) = team1.iter().find(|id| team2.contains(id)) {
        bail!("Player {} cannot be on both teams", shared);
    }
    Ok((team1, team2))
}

fn join_ids(ids: &[PlayerId]) -> String {
    ids.iter().map(PlayerId::as_str).collect::<Vec<_>>().join(", ")
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let cut: String = s.chars().take(max.saturating_sub(1)).collect();
        format!("{}…", cut)
    }
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
