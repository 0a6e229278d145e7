// Player-to-team and player-to-owner mappings derived from recent weeks.

use std::collections::{BTreeSet, HashMap};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::player::{PlayerRecordStore, Position};
use crate::week::Week;

// ---------------------------------------------------------------------------
// Team / position map
// ---------------------------------------------------------------------------

/// Each player's current NFL team and position.
#[derive(Debug, Clone, Default)]
pub struct TeamPositionMap {
    entries: HashMap<String, (String, Position)>,
}

impl TeamPositionMap {
    /// The most recent of `weeks` in which a player appears decides the
    /// mapping.
    pub fn from_store(store: &PlayerRecordStore, weeks: &[Week]) -> Self {
        let mut entries: HashMap<String, (String, Position)> = HashMap::new();
        for &week in weeks.iter().rev() {
            for row in store.in_week(week) {
                entries
                    .entry(row.player.clone())
                    .or_insert_with(|| (row.team.clone(), row.position));
            }
        }
        TeamPositionMap { entries }
    }

    pub fn get(&self, player: &str) -> Option<(&str, Position)> {
        self.entries
            .get(player)
            .map(|(team, pos)| (team.as_str(), *pos))
    }

    pub fn team_of(&self, player: &str) -> Option<&str> {
        self.get(player).map(|(team, _)| team)
    }

    pub fn position_of(&self, player: &str) -> Option<Position> {
        self.get(player).map(|(_, pos)| pos)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Manual ownership corrections
// ---------------------------------------------------------------------------

/// One manual override: `player` belongs to `owner`, one of the owners
/// sharing the initials `shared` in the raw data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OwnerCorrection {
    #[serde(rename = "SHARED")]
    pub shared: String,
    #[serde(rename = "OWNER")]
    pub owner: String,
    #[serde(rename = "PLAYER")]
    pub player: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OwnerCorrections {
    pub entries: Vec<OwnerCorrection>,
}

impl OwnerCorrections {
    pub fn new(entries: Vec<OwnerCorrection>) -> Self {
        OwnerCorrections { entries }
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Reassign listed players to their disambiguated owner, then release
    /// anyone still held under shared initials to free agency.
    pub fn apply(&self, mut owners: HashMap<String, String>) -> HashMap<String, String> {
        if self.entries.is_empty() {
            return owners;
        }
        for entry in &self.entries {
            if let Some(owner) = owners.get_mut(&entry.player) {
                *owner = entry.owner.clone();
            }
        }
        let shared: BTreeSet<&str> = self.entries.iter().map(|e| e.shared.as_str()).collect();
        let before = owners.len();
        owners.retain(|_, owner| !shared.contains(owner.as_str()));
        info!(
            corrected = self.entries.len(),
            released = before - owners.len(),
            "manual ownership corrections applied"
        );
        owners
    }
}

// ---------------------------------------------------------------------------
// Roster ownership
// ---------------------------------------------------------------------------

/// Player to fantasy owner. A player without an entry is a free agent.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RosterMap {
    owners: HashMap<String, String>,
}

impl RosterMap {
    pub fn from_map(owners: HashMap<String, String>) -> Self {
        RosterMap { owners }
    }

    /// The most recent of `weeks` in which a player has an owner wins, then
    /// manual corrections are applied on top.
    pub fn from_store(
        store: &PlayerRecordStore,
        weeks: &[Week],
        corrections: &OwnerCorrections,
    ) -> Self {
        let mut owners: HashMap<String, String> = HashMap::new();
        for &week in weeks.iter().rev() {
            for row in store.in_week(week) {
                if let Some(owner) = &row.owner {
                    owners
                        .entry(row.player.clone())
                        .or_insert_with(|| owner.clone());
                }
            }
        }
        debug!(rostered = owners.len(), "roster ownership resolved");
        RosterMap {
            owners: corrections.apply(owners),
        }
    }

    pub fn owner_of(&self, player: &str) -> Option<&str> {
        self.owners.get(player).map(String::as_str)
    }

    pub fn is_free_agent(&self, player: &str) -> bool {
        !self.owners.contains_key(player)
    }

    /// Distinct owners, sorted.
    pub fn owners(&self) -> BTreeSet<&str> {
        self.owners.values().map(String::as_str).collect()
    }

    /// Players rostered by `owner`, sorted.
    pub fn players_of(&self, owner: &str) -> Vec<&str> {
        let mut players: Vec<&str> = self
            .owners
            .iter()
            .filter(|(_, o)| o.as_str() == owner)
            .map(|(p, _)| p.as_str())
            .collect();
        players.sort_unstable();
        players
    }

    pub fn len(&self) -> usize {
        self.owners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.owners.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
