// gridcast entry point.
//
// Startup sequence:
// 1. Parse the command line
// 2. Initialize tracing (log to file, not terminal)
// 3. Load config
// 4. Load league data
// 5. Prepare the record store
// 6. Run the requested pass and write its reports

mod report;

use std::path::Path;

use anyhow::Context;
use clap::{Parser, Subcommand};
use gridcast_core::config;
use gridcast_core::ingest;
use gridcast_core::player::Position;
use gridcast_core::week::{Week, WeekSelector};
use gridcast_football::leaders::LeadersQuery;
use gridcast_football::pipeline::Pipeline;
use tracing::{info, warn};

use report::RunSummary;

#[derive(Parser, Debug)]
#[command(name = "gridcast", about = "Fantasy football features, projections and standings")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug, Clone)]
enum Command {
    /// Build the retrospective feature table for one position.
    Features {
        #[arg(long)]
        position: Position,
        /// Target weeks (default: every completed week).
        #[arg(long)]
        week: Vec<Week>,
    },
    /// Project every player into the remaining weeks.
    Project,
    /// Simulate the remaining regular season and project final standings.
    Standings,
    /// Rank owners by the value of their best season-to-date lineup.
    Rankings,
    /// Season statistic leaders.
    Leaders {
        #[arg(long)]
        stat: String,
        #[arg(long)]
        tiebreak: Option<String>,
        #[arg(long)]
        position: Vec<Position>,
        #[arg(long)]
        team: Vec<String>,
        #[arg(long)]
        opponent: Vec<String>,
        #[arg(long)]
        week: Vec<Week>,
        #[arg(long, default_value = "10")]
        limit: usize,
    },
}

impl Command {
    fn name(&self) -> &'static str {
        match self {
            Command::Features { .. } => "features",
            Command::Project => "project",
            Command::Standings => "standings",
            Command::Rankings => "rankings",
            Command::Leaders { .. } => "leaders",
        }
    }
}

fn main() -> anyhow::Result<()> {
    // 1. Parse the command line
    let cli = Cli::parse();

    // 2. Initialize tracing (log to file, not terminal)
    init_tracing()?;
    info!("gridcast starting: {}", cli.command.name());

    // 3. Load config
    let config = config::load_config().context("failed to load configuration")?;
    info!(
        "Config loaded: league={}, season {}, {}/{} weeks completed",
        config.league.name, config.league.season, config.league.completed_weeks, config.league.total_weeks
    );

    // 4. Load league data
    let data = ingest::load_league_data(&config).context("failed to load league data")?;

    // 5. Prepare the record store
    let pipeline = Pipeline::new(&config, &data).context("failed to prepare record store")?;

    // 6. Run the requested pass
    let out_dir = Path::new(&config.output_dir);
    report::ensure_output_dir(out_dir)?;
    let mut summary = RunSummary::new(cli.command.name());

    match cli.command {
        Command::Features { position, week } => {
            let selector = match week.len() {
                0 => WeekSelector::AllWeeks,
                1 => WeekSelector::ExplicitWeek(week[0]),
                _ => WeekSelector::ExplicitWeeks(week),
            };
            let table = pipeline
                .features(position, &selector)
                .with_context(|| format!("failed to build {position} feature table"))?;
            report::write_feature_table(out_dir, &table, &mut summary)?;
        }
        Command::Project => {
            let projections = pipeline.project().context("projection run failed")?;
            for issue in &projections.run.issues {
                warn!("skipped: {}", issue);
            }
            report::write_projections(out_dir, &projections, &mut summary)?;
        }
        Command::Standings => {
            let result = pipeline.simulate().context("standings simulation failed")?;
            report::write_projections(out_dir, &result.projections, &mut summary)?;
            let sim = &result.simulation;
            report::write_simulation(out_dir, &sim.starters, &sim.matchups, &sim.standings, &mut summary)?;

            println!("{:<8} {:>4} {:>4} {:>4} {:>10}", "OWNER", "W", "L", "T", "PTS");
            for row in &sim.standings {
                println!(
                    "{:<8} {:>4} {:>4} {:>4} {:>10.2}",
                    row.owner, row.wins, row.losses, row.ties, row.points
                );
            }
        }
        Command::Rankings => {
            let rankings = pipeline.rankings().context("power rankings failed")?;
            report::write_rankings(out_dir, &rankings, &mut summary)?;
        }
        Command::Leaders {
            stat,
            tiebreak,
            position,
            team,
            opponent,
            week,
            limit,
        } => {
            let query = LeadersQuery {
                stat: stat.to_uppercase(),
                tiebreak: tiebreak.map(|t| t.to_uppercase()),
                positions: position,
                teams: team,
                opponents: opponent,
                weeks: week,
                limit,
            };
            let leaders = pipeline.leaders(&query).context("statistic leaders query failed")?;
            report::write_leaders(out_dir, &query.stat, query.tiebreak.as_deref(), &leaders, &mut summary)?;
            for (i, row) in leaders.iter().enumerate() {
                println!("{:>2}. {:<28} {:<4} {:>9.2}", i + 1, row.player, row.position, row.total);
            }
        }
    }

    let summary_path = summary.write(out_dir)?;
    summary.print();
    info!("run summary written to {}", summary_path.display());
    Ok(())
}

/// Initialize tracing to log to a file (stdout carries the report output).
fn init_tracing() -> anyhow::Result<()> {
    use tracing_subscriber::fmt;
    use tracing_subscriber::EnvFilter;

    let log_dir = std::env::current_dir()?.join("logs");
    std::fs::create_dir_all(&log_dir)?;

    let log_file = std::fs::File::create(log_dir.join("gridcast.log"))?;

    let subscriber = fmt::Subscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("gridcast=info,warn")),
        )
        .with_writer(log_file)
        .with_ansi(false)
        .with_target(true)
        .with_thread_ids(true)
        .with_line_number(true)
        .finish();

    tracing::subscriber::set_global_default(subscriber).context("failed to set tracing subscriber")?;

    Ok(())
}
