// NFL and fantasy-league schedules, plus the standings table they feed.

use std::collections::{BTreeSet, HashMap};

use serde::{Deserialize, Serialize};

use crate::week::Week;

// ---------------------------------------------------------------------------
// NFL schedule
// ---------------------------------------------------------------------------

/// A team's opponent in one week.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Opponent {
    Team(String),
    Bye,
}

impl Opponent {
    /// Parse a schedule cell. Away markers (`@`) are stripped; blank and
    /// `--` cells carry no opponent.
    pub fn parse(cell: &str) -> Option<Opponent> {
        let value = cell.trim().trim_start_matches('@').trim().to_uppercase();
        match value.as_str() {
            "" | "--" => None,
            "BYE" | "*BYE*" => Some(Opponent::Bye),
            _ => Some(Opponent::Team(value)),
        }
    }

    pub fn team(&self) -> Option<&str> {
        match self {
            Opponent::Team(t) => Some(t),
            Opponent::Bye => None,
        }
    }
}

/// Team by week to opponent.
#[derive(Debug, Clone, Default)]
pub struct NflSchedule {
    entries: HashMap<(String, Week), Opponent>,
}

impl NflSchedule {
    pub fn from_entries(entries: Vec<(String, Week, Opponent)>) -> Self {
        NflSchedule {
            entries: entries
                .into_iter()
                .map(|(team, week, opp)| ((team, week), opp))
                .collect(),
        }
    }

    pub fn opponent(&self, team: &str, week: Week) -> Option<&Opponent> {
        self.entries.get(&(team.to_string(), week))
    }

    pub fn teams(&self) -> BTreeSet<&str> {
        self.entries.keys().map(|(t, _)| t.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Fantasy matchups
// ---------------------------------------------------------------------------

/// Owner by week to opposing owner.
#[derive(Debug, Clone, Default)]
pub struct OwnerSchedule {
    pairings: HashMap<(String, Week), String>,
}

impl OwnerSchedule {
    pub fn from_entries(entries: Vec<(String, Week, String)>) -> Self {
        OwnerSchedule {
            pairings: entries
                .into_iter()
                .map(|(owner, week, opp)| ((owner, week), opp))
                .collect(),
        }
    }

    pub fn opponent_of(&self, owner: &str, week: Week) -> Option<&str> {
        self.pairings
            .get(&(owner.to_string(), week))
            .map(String::as_str)
    }

    pub fn owners(&self) -> BTreeSet<&str> {
        self.pairings.keys().map(|(o, _)| o.as_str()).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.pairings.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Standings
// ---------------------------------------------------------------------------

/// One owner's season record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StandingsRow {
    #[serde(rename = "OWNER")]
    pub owner: String,
    #[serde(rename = "WINS")]
    pub wins: u32,
    #[serde(rename = "LOSSES")]
    pub losses: u32,
    #[serde(rename = "TIES")]
    pub ties: u32,
    #[serde(rename = "PTS")]
    pub points: f64,
}

impl StandingsRow {
    pub fn new(owner: impl Into<String>) -> Self {
        StandingsRow {
            owner: owner.into(),
            wins: 0,
            losses: 0,
            ties: 0,
            points: 0.0,
        }
    }

    pub fn games(&self) -> u32 {
        self.wins + self.losses + self.ties
    }
}
