// CSV ingestion of the normalized league exports.
//
// Weekly stats and both schedules have open-ended column sets (one column per
// statistic or per week), so they are read header-first from raw records. The
// fixed-layout files deserialize straight into serde structs.

use std::collections::{BTreeMap, BTreeSet};
use std::io::Read;
use std::path::Path;

use serde::Deserialize;
use tracing::{info, warn};

use crate::config::{Config, DataPaths};
use crate::player::{Participation, PlayerObservation, PlayerRecordStore, Position, StatusEntry};
use crate::roster::{OwnerCorrection, OwnerCorrections};
use crate::schedule::{NflSchedule, Opponent, OwnerSchedule, StandingsRow};
use crate::week::Week;

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    #[error("failed to read file {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },

    #[error("CSV error in {path}: {source}")]
    Csv { path: String, source: csv::Error },

    #[error("validation error: {0}")]
    Validation(String),
}

// ---------------------------------------------------------------------------
// Public types
// ---------------------------------------------------------------------------

/// Everything the pipeline reads before it starts computing.
#[derive(Debug, Clone)]
pub struct LeagueData {
    pub store: PlayerRecordStore,
    pub statuses: Vec<StatusEntry>,
    pub nfl_schedule: NflSchedule,
    pub owner_schedule: OwnerSchedule,
    pub standings: Vec<StandingsRow>,
    pub corrections: OwnerCorrections,
}

// ---------------------------------------------------------------------------
// Raw CSV serde structs (private)
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
#[allow(non_snake_case)]
struct RawStatus {
    PLAYER: String,
    TEAM: String,
    POS: String,
    WEEK: String,
    STATUS: String,
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

const IDENTITY_COLUMNS: [&str; 7] = ["PLAYER", "TEAM", "POS", "WEEK", "OPPONENT", "OWNER", "STATUS"];

/// Opponent cell of a player who was not on an NFL roster that week.
const FREE_AGENT_OPPONENT: &str = "FA";

/// Numeric stat cell. Blank, `--` and non-numeric cells are absent; a
/// trailing percent sign is dropped.
fn parse_stat(cell: &str) -> Option<f64> {
    let value = cell.trim().trim_end_matches('%').trim();
    if value.is_empty() || value == "--" {
        return None;
    }
    value.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Owner cell. Blank, `--`, `FA` and bye markers mean free agent.
fn parse_owner(cell: &str) -> Option<String> {
    let value = cell.trim();
    match value.to_uppercase().as_str() {
        "" | "--" | "FA" | "0" | "BYE" | "*BYE*" => None,
        _ => Some(value.to_string()),
    }
}

fn column(headers: &csv::StringRecord, name: &str) -> Option<usize> {
    headers.iter().position(|h| h.trim().eq_ignore_ascii_case(name))
}

fn require_column(headers: &csv::StringRecord, name: &str, source: &str) -> Result<usize, IngestError> {
    column(headers, name)
        .ok_or_else(|| IngestError::Validation(format!("{source}: missing required column {name}")))
}

fn csv_error(source: &str) -> impl Fn(csv::Error) -> IngestError + '_ {
    move |e| IngestError::Csv {
        path: source.to_string(),
        source: e,
    }
}

fn week_columns(headers: &csv::StringRecord) -> Vec<(usize, Week)> {
    headers
        .iter()
        .enumerate()
        .filter_map(|(i, h)| h.parse::<Week>().ok().map(|w| (i, w)))
        .collect()
}

// ---------------------------------------------------------------------------
// Reader-based loaders (private, enable testing without temp files)
// ---------------------------------------------------------------------------

fn load_observations_from_reader<R: Read>(rdr: R, source: &str) -> Result<PlayerRecordStore, IngestError> {
    let mut reader = csv::Reader::from_reader(rdr);
    let headers = reader.headers().map_err(csv_error(source))?.clone();

    let player_col = require_column(&headers, "PLAYER", source)?;
    let team_col = require_column(&headers, "TEAM", source)?;
    let pos_col = require_column(&headers, "POS", source)?;
    let week_col = require_column(&headers, "WEEK", source)?;
    let opp_col = column(&headers, "OPPONENT");
    let owner_col = column(&headers, "OWNER");
    let status_col = column(&headers, "STATUS");

    let stat_cols: Vec<(usize, String)> = headers
        .iter()
        .enumerate()
        .filter(|(_, h)| {
            !IDENTITY_COLUMNS
                .iter()
                .any(|id| h.trim().eq_ignore_ascii_case(id))
        })
        .map(|(i, h)| (i, h.trim().to_string()))
        .collect();
    let declared: BTreeSet<String> = stat_cols.iter().map(|(_, s)| s.clone()).collect();

    let mut rows = Vec::new();
    for (line, result) in reader.records().enumerate() {
        let record = match result {
            Ok(r) => r,
            Err(e) => {
                warn!("skipping malformed stats row {}: {}", line + 2, e);
                continue;
            }
        };
        let cell = |i: usize| record.get(i).unwrap_or("").trim();
        let opt_cell = |i: Option<usize>| i.map(|i| cell(i)).unwrap_or("");

        let player = cell(player_col);
        if player.is_empty() {
            warn!("skipping stats row {}: empty PLAYER", line + 2);
            continue;
        }
        let Some(position) = Position::from_str_pos(cell(pos_col)) else {
            warn!("skipping '{}': unknown POS '{}'", player, cell(pos_col));
            continue;
        };
        let week = match cell(week_col).parse::<Week>() {
            Ok(w) => w,
            Err(e) => {
                warn!("skipping '{}': {}", player, e);
                continue;
            }
        };
        let Some(mut participation) = Participation::from_status(opt_cell(status_col)) else {
            warn!("skipping '{}' {}: unknown STATUS '{}'", player, week, opt_cell(status_col));
            continue;
        };
        let opponent = match Opponent::parse(opt_cell(opp_col)) {
            Some(Opponent::Team(t)) if t == FREE_AGENT_OPPONENT => None,
            Some(Opponent::Team(t)) => Some(t),
            Some(Opponent::Bye) => {
                participation = Participation::Bye;
                None
            }
            None => None,
        };

        let stats: BTreeMap<String, f64> = stat_cols
            .iter()
            .filter_map(|(i, name)| parse_stat(cell(*i)).map(|v| (name.clone(), v)))
            .collect();

        rows.push(PlayerObservation {
            player: player.to_string(),
            team: cell(team_col).to_uppercase(),
            position,
            week,
            opponent,
            owner: parse_owner(opt_cell(owner_col)),
            stats,
            participation,
        });
    }
    Ok(PlayerRecordStore::from_parts(rows, declared))
}

fn load_player_status_from_reader<R: Read>(rdr: R) -> Result<Vec<StatusEntry>, csv::Error> {
    let mut reader = csv::Reader::from_reader(rdr);
    let mut entries = Vec::new();
    for result in reader.deserialize::<RawStatus>() {
        match result {
            Ok(raw) => {
                let player = raw.PLAYER.trim();
                let Some(position) = Position::from_str_pos(&raw.POS) else {
                    warn!("skipping status for '{}': unknown POS '{}'", player, raw.POS);
                    continue;
                };
                let Ok(week) = raw.WEEK.parse::<Week>() else {
                    warn!("skipping status for '{}': bad WEEK '{}'", player, raw.WEEK);
                    continue;
                };
                let participation = match Participation::from_status(&raw.STATUS) {
                    Some(p @ (Participation::Out | Participation::Bye)) => p,
                    _ => {
                        warn!("skipping status for '{}': STATUS '{}' is not OUT or BYE", player, raw.STATUS);
                        continue;
                    }
                };
                entries.push(StatusEntry {
                    player: player.to_string(),
                    team: raw.TEAM.trim().to_uppercase(),
                    position,
                    week,
                    participation,
                });
            }
            Err(e) => {
                warn!("skipping malformed status row: {}", e);
            }
        }
    }
    Ok(entries)
}

fn load_nfl_schedule_from_reader<R: Read>(rdr: R, source: &str) -> Result<NflSchedule, IngestError> {
    let mut reader = csv::Reader::from_reader(rdr);
    let headers = reader.headers().map_err(csv_error(source))?.clone();
    let team_col = require_column(&headers, "TEAM", source)?;
    let weeks = week_columns(&headers);

    let mut entries = Vec::new();
    for result in reader.records() {
        let record = match result {
            Ok(r) => r,
            Err(e) => {
                warn!("skipping malformed schedule row: {}", e);
                continue;
            }
        };
        let team = record.get(team_col).unwrap_or("").trim().to_uppercase();
        if team.is_empty() {
            continue;
        }
        for &(i, week) in &weeks {
            if let Some(opp) = Opponent::parse(record.get(i).unwrap_or("")) {
                entries.push((team.clone(), week, opp));
            }
        }
    }
    Ok(NflSchedule::from_entries(entries))
}

fn load_owner_schedule_from_reader<R: Read>(rdr: R, source: &str) -> Result<OwnerSchedule, IngestError> {
    let mut reader = csv::Reader::from_reader(rdr);
    let headers = reader.headers().map_err(csv_error(source))?.clone();
    let owner_col = require_column(&headers, "OWNER", source)?;
    let weeks = week_columns(&headers);

    let mut entries = Vec::new();
    for result in reader.records() {
        let record = match result {
            Ok(r) => r,
            Err(e) => {
                warn!("skipping malformed matchup row: {}", e);
                continue;
            }
        };
        let owner = record.get(owner_col).unwrap_or("").trim();
        if owner.is_empty() {
            continue;
        }
        for &(i, week) in &weeks {
            let opponent = record.get(i).unwrap_or("").trim();
            if !opponent.is_empty() {
                entries.push((owner.to_string(), week, opponent.to_string()));
            }
        }
    }
    Ok(OwnerSchedule::from_entries(entries))
}

fn load_standings_from_reader<R: Read>(rdr: R) -> Result<Vec<StandingsRow>, csv::Error> {
    let mut reader = csv::Reader::from_reader(rdr);
    let mut rows: Vec<StandingsRow> = Vec::new();
    for result in reader.deserialize::<StandingsRow>() {
        match result {
            Ok(mut row) => {
                row.owner = row.owner.trim().to_string();
                if rows.iter().any(|r| r.owner == row.owner) {
                    warn!("duplicate standings row for '{}', using latest value", row.owner);
                    rows.retain(|r| r.owner != row.owner);
                }
                rows.push(row);
            }
            Err(e) => {
                warn!("skipping malformed standings row: {}", e);
            }
        }
    }
    Ok(rows)
}

fn load_owner_corrections_from_reader<R: Read>(rdr: R) -> Result<OwnerCorrections, csv::Error> {
    let mut reader = csv::Reader::from_reader(rdr);
    let mut entries = Vec::new();
    for result in reader.deserialize::<OwnerCorrection>() {
        match result {
            Ok(raw) => entries.push(OwnerCorrection {
                shared: raw.shared.trim().to_string(),
                owner: raw.owner.trim().to_string(),
                player: raw.player.trim().to_string(),
            }),
            Err(e) => {
                warn!("skipping malformed correction row: {}", e);
            }
        }
    }
    Ok(OwnerCorrections::new(entries))
}

// ---------------------------------------------------------------------------
// Public path-based loaders
// ---------------------------------------------------------------------------

fn open(path: &Path) -> Result<std::fs::File, IngestError> {
    std::fs::File::open(path).map_err(|e| IngestError::Io {
        path: path.display().to_string(),
        source: e,
    })
}

/// Load weekly player stats into a record store.
pub fn load_observations(path: &Path) -> Result<PlayerRecordStore, IngestError> {
    load_observations_from_reader(open(path)?, &path.display().to_string())
}

/// Load the did-not-play report.
pub fn load_player_status(path: &Path) -> Result<Vec<StatusEntry>, IngestError> {
    load_player_status_from_reader(open(path)?).map_err(csv_error(&path.display().to_string()))
}

pub fn load_nfl_schedule(path: &Path) -> Result<NflSchedule, IngestError> {
    load_nfl_schedule_from_reader(open(path)?, &path.display().to_string())
}

pub fn load_owner_schedule(path: &Path) -> Result<OwnerSchedule, IngestError> {
    load_owner_schedule_from_reader(open(path)?, &path.display().to_string())
}

pub fn load_standings(path: &Path) -> Result<Vec<StandingsRow>, IngestError> {
    load_standings_from_reader(open(path)?).map_err(csv_error(&path.display().to_string()))
}

pub fn load_owner_corrections(path: &Path) -> Result<OwnerCorrections, IngestError> {
    load_owner_corrections_from_reader(open(path)?).map_err(csv_error(&path.display().to_string()))
}

/// Load all league inputs using paths from the config.
pub fn load_league_data(config: &Config) -> Result<LeagueData, IngestError> {
    load_all_from_paths(&config.data_paths)
}

/// Load all league inputs from explicit paths. Exposed for testing and flexibility.
pub fn load_all_from_paths(paths: &DataPaths) -> Result<LeagueData, IngestError> {
    let store = load_observations(Path::new(&paths.weekly_stats))?;
    let statuses = load_player_status(Path::new(&paths.player_status))?;
    let nfl_schedule = load_nfl_schedule(Path::new(&paths.nfl_schedule))?;
    let owner_schedule = load_owner_schedule(Path::new(&paths.owner_schedule))?;
    let standings = load_standings(Path::new(&paths.standings))?;

    let corrections = match &paths.owner_corrections {
        Some(p) if Path::new(p).exists() => load_owner_corrections(Path::new(p))?,
        Some(p) => {
            info!("no owner corrections at {}; skipping", p);
            OwnerCorrections::default()
        }
        None => OwnerCorrections::default(),
    };

    if store.is_empty() {
        return Err(IngestError::Validation(
            "weekly stats CSV produced zero valid rows".into(),
        ));
    }
    if nfl_schedule.is_empty() {
        return Err(IngestError::Validation(
            "NFL schedule CSV produced zero entries".into(),
        ));
    }

    info!(
        observations = store.len(),
        statuses = statuses.len(),
        owners = standings.len(),
        "league data loaded"
    );

    Ok(LeagueData {
        store,
        statuses,
        nfl_schedule,
        owner_schedule,
        standings,
        corrections,
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
