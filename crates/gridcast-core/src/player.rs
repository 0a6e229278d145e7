// Player positions, weekly observations and the normalized record store.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::error::ModelError;
use crate::roster::{RosterMap, TeamPositionMap};
use crate::schedule::{NflSchedule, Opponent};
use crate::week::Week;

// ---------------------------------------------------------------------------
// Position
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown position `{0}`")]
pub struct UnknownPosition(pub String);

/// Football positions a fantasy roster draws from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Position {
    Quarterback,
    RunningBack,
    WideReceiver,
    TightEnd,
    Kicker,
    Defense,
}

impl Position {
    pub const ALL: [Position; 6] = [
        Position::Quarterback,
        Position::RunningBack,
        Position::WideReceiver,
        Position::TightEnd,
        Position::Kicker,
        Position::Defense,
    ];

    /// Parse a position abbreviation.
    ///
    /// Accepts "QB", "RB", "WR", "TE", "K" and the defense spellings
    /// "D/ST", "DST" and "DEF".
    pub fn from_str_pos(s: &str) -> Option<Self> {
        match s.trim().to_uppercase().as_str() {
            "QB" => Some(Position::Quarterback),
            "RB" => Some(Position::RunningBack),
            "WR" => Some(Position::WideReceiver),
            "TE" => Some(Position::TightEnd),
            "K" => Some(Position::Kicker),
            "D/ST" | "DST" | "DEF" => Some(Position::Defense),
            _ => None,
        }
    }

    pub fn display_str(&self) -> &'static str {
        match self {
            Position::Quarterback => "QB",
            Position::RunningBack => "RB",
            Position::WideReceiver => "WR",
            Position::TightEnd => "TE",
            Position::Kicker => "K",
            Position::Defense => "D/ST",
        }
    }

    /// File-name-safe label (`D/ST` becomes `DST`).
    pub fn file_label(&self) -> &'static str {
        match self {
            Position::Defense => "DST",
            other => other.display_str(),
        }
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_str())
    }
}

impl FromStr for Position {
    type Err = UnknownPosition;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Position::from_str_pos(s).ok_or_else(|| UnknownPosition(s.to_string()))
    }
}

impl TryFrom<String> for Position {
    type Error = UnknownPosition;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Position> for String {
    fn from(pos: Position) -> Self {
        pos.display_str().to_string()
    }
}

// ---------------------------------------------------------------------------
// Participation
// ---------------------------------------------------------------------------

/// Whether a player took part in a week's game.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Participation {
    Played,
    Out,
    Bye,
}

impl Participation {
    /// Parse a status cell. Blank means the player played.
    pub fn from_status(s: &str) -> Option<Self> {
        match s.trim().to_uppercase().as_str() {
            "" | "PLAYED" | "ACTIVE" => Some(Participation::Played),
            "OUT" | "O" | "IR" => Some(Participation::Out),
            "BYE" | "*BYE*" => Some(Participation::Bye),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Participation::Played => "PLAYED",
            Participation::Out => "OUT",
            Participation::Bye => "BYE",
        }
    }
}

// ---------------------------------------------------------------------------
// Observations
// ---------------------------------------------------------------------------

/// One player's line for one week.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerObservation {
    pub player: String,
    pub team: String,
    pub position: Position,
    pub week: Week,
    pub opponent: Option<String>,
    pub owner: Option<String>,
    pub stats: BTreeMap<String, f64>,
    pub participation: Participation,
}

impl PlayerObservation {
    /// Stat value, with a missing entry read as zero.
    pub fn stat(&self, name: &str) -> f64 {
        self.stats.get(name).copied().unwrap_or(0.0)
    }

    pub fn stat_opt(&self, name: &str) -> Option<f64> {
        self.stats.get(name).copied()
    }

    pub fn has_stat(&self, name: &str) -> bool {
        self.stats.contains_key(name)
    }

    pub fn played(&self) -> bool {
        self.participation == Participation::Played
    }
}

/// A did-not-play entry from the weekly status report.
#[derive(Debug, Clone, PartialEq)]
pub struct StatusEntry {
    pub player: String,
    pub team: String,
    pub position: Position,
    pub week: Week,
    pub participation: Participation,
}

// ---------------------------------------------------------------------------
// Record store
// ---------------------------------------------------------------------------

/// Normalized per-player-per-week table. Keyed by (player, week); every
/// transformation returns a new store and leaves its input untouched.
#[derive(Debug, Clone, Default)]
pub struct PlayerRecordStore {
    rows: Vec<PlayerObservation>,
    index: HashMap<(String, Week), usize>,
    stat_columns: BTreeSet<String>,
}

impl PlayerRecordStore {
    /// Build a store whose stat columns are the union of the rows' stats.
    pub fn new(rows: Vec<PlayerObservation>) -> Self {
        Self::from_parts(rows, BTreeSet::new())
    }

    /// Build a store with declared stat columns (e.g. a CSV header) in
    /// addition to whatever the rows carry. A repeated (player, week) key
    /// replaces the earlier row.
    pub fn from_parts(rows: Vec<PlayerObservation>, columns: BTreeSet<String>) -> Self {
        let mut store = PlayerRecordStore {
            rows: Vec::with_capacity(rows.len()),
            index: HashMap::with_capacity(rows.len()),
            stat_columns: columns,
        };
        for row in rows {
            store.insert(row);
        }
        store
    }

    fn insert(&mut self, row: PlayerObservation) {
        self.stat_columns.extend(row.stats.keys().cloned());
        let key = (row.player.clone(), row.week);
        match self.index.get(&key) {
            Some(&i) => {
                warn!(player = %row.player, week = %row.week, "duplicate observation replaces earlier row");
                self.rows[i] = row;
            }
            None => {
                self.index.insert(key, self.rows.len());
                self.rows.push(row);
            }
        }
    }

    pub fn rows(&self) -> &[PlayerObservation] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn get(&self, player: &str, week: Week) -> Option<&PlayerObservation> {
        self.index
            .get(&(player.to_string(), week))
            .map(|&i| &self.rows[i])
    }

    pub fn in_week(&self, week: Week) -> impl Iterator<Item = &PlayerObservation> {
        self.rows.iter().filter(move |r| r.week == week)
    }

    pub fn in_weeks<'a>(&'a self, weeks: &'a [Week]) -> impl Iterator<Item = &'a PlayerObservation> {
        self.rows.iter().filter(move |r| weeks.contains(&r.week))
    }

    pub fn stat_columns(&self) -> &BTreeSet<String> {
        &self.stat_columns
    }

    pub fn has_stat(&self, name: &str) -> bool {
        self.stat_columns.contains(name)
    }

    /// Fail with `InvalidStatistic` unless `name` is a stat column.
    pub fn require_stat(&self, name: &str) -> Result<(), ModelError> {
        if self.has_stat(name) {
            Ok(())
        } else {
            Err(ModelError::InvalidStatistic {
                stat: name.to_string(),
            })
        }
    }

    pub fn players(&self) -> BTreeSet<&str> {
        self.rows.iter().map(|r| r.player.as_str()).collect()
    }

    pub fn weeks_present(&self) -> BTreeSet<Week> {
        self.rows.iter().map(|r| r.week).collect()
    }

    /// New store holding the rows that satisfy `keep`. Stat columns carry over.
    pub fn filter<F>(&self, mut keep: F) -> PlayerRecordStore
    where
        F: FnMut(&PlayerObservation) -> bool,
    {
        let rows = self.rows.iter().filter(|r| keep(r)).cloned().collect();
        PlayerRecordStore::from_parts(rows, self.stat_columns.clone())
    }

    /// Add an OUT or BYE row for each status entry whose (player, week) has
    /// no observation yet.
    pub fn with_status_rows(&self, entries: &[StatusEntry]) -> PlayerRecordStore {
        let mut next = self.clone();
        let mut added = 0usize;
        for entry in entries {
            if entry.participation == Participation::Played {
                continue;
            }
            if next.get(&entry.player, entry.week).is_some() {
                continue;
            }
            next.insert(PlayerObservation {
                player: entry.player.clone(),
                team: entry.team.clone(),
                position: entry.position,
                week: entry.week,
                opponent: None,
                owner: None,
                stats: BTreeMap::new(),
                participation: entry.participation,
            });
            added += 1;
        }
        debug!(added, "did-not-play rows added");
        next
    }

    /// Give every player a row in every week present in the store. A gap
    /// becomes a zero-stat PLAYED row against the scheduled opponent, or a
    /// BYE row when the player's team is on bye. Players with no known team
    /// are left alone.
    pub fn fill_missing_weeks(
        &self,
        team_positions: &TeamPositionMap,
        schedule: &NflSchedule,
    ) -> PlayerRecordStore {
        let weeks = self.weeks_present();
        let players: Vec<String> = self.players().into_iter().map(str::to_string).collect();
        let zero_stats: BTreeMap<String, f64> =
            self.stat_columns.iter().map(|s| (s.clone(), 0.0)).collect();

        let mut next = self.clone();
        let mut added = 0usize;
        for player in &players {
            let Some((team, position)) = team_positions.get(player) else {
                warn!(player = %player, "no team mapping; missing weeks not filled");
                continue;
            };
            for &week in &weeks {
                if next.get(player, week).is_some() {
                    continue;
                }
                let (opponent, participation, stats) = match schedule.opponent(team, week) {
                    Some(Opponent::Bye) => (None, Participation::Bye, BTreeMap::new()),
                    Some(Opponent::Team(t)) => {
                        (Some(t.clone()), Participation::Played, zero_stats.clone())
                    }
                    None => (None, Participation::Played, zero_stats.clone()),
                };
                next.insert(PlayerObservation {
                    player: player.clone(),
                    team: team.to_string(),
                    position,
                    week,
                    opponent,
                    owner: None,
                    stats,
                    participation,
                });
                added += 1;
            }
        }
        debug!(added, "missing player weeks filled");
        next
    }

    /// Refresh every row's owner from the roster map.
    pub fn with_owners(&self, roster: &RosterMap) -> PlayerRecordStore {
        let rows = self
            .rows
            .iter()
            .map(|r| PlayerObservation {
                owner: roster.owner_of(&r.player).map(str::to_string),
                ..r.clone()
            })
            .collect();
        PlayerRecordStore::from_parts(rows, self.stat_columns.clone())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
