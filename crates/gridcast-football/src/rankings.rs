// Power rankings: each owner's best season-to-date lineup, valued by the
// points classes its starters have earned.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use gridcast_core::player::{PlayerRecordStore, Position};
use gridcast_core::week::Week;
use tracing::info;

use crate::features::fpts_class;
use crate::lineup::{assign_lineups, LineupCandidate, LineupRules};

/// A rostered player's season totals.
#[derive(Debug, Clone, PartialEq)]
pub struct SeasonTotal {
    pub player: String,
    pub position: Position,
    pub owner: String,
    pub fpts: f64,
    pub class_value: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RankingSlot {
    pub slot: String,
    pub player: String,
    pub class_value: f64,
    pub fpts: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PowerRanking {
    pub owner: String,
    pub slots: Vec<RankingSlot>,
    pub total_class: f64,
    pub total_fpts: f64,
}

impl PowerRanking {
    pub fn slot(&self, slot: &str) -> Option<&RankingSlot> {
        self.slots.iter().find(|s| s.slot == slot)
    }
}

/// Sum FPTS and FPTS class over `weeks` for every owned player. Rows
/// without an FPTS value contribute nothing.
pub fn season_totals(store: &PlayerRecordStore, weeks: &[Week]) -> Vec<SeasonTotal> {
    let mut totals: BTreeMap<(String, Position, String), (f64, f64)> = BTreeMap::new();
    for row in store.in_weeks(weeks).filter(|r| r.played()) {
        let (Some(owner), Some(fpts)) = (&row.owner, row.stat_opt("FPTS")) else {
            continue;
        };
        let entry = totals
            .entry((row.player.clone(), row.position, owner.clone()))
            .or_insert((0.0, 0.0));
        entry.0 += fpts;
        entry.1 += f64::from(fpts_class(fpts));
    }
    totals
        .into_iter()
        .map(|((player, position, owner), (fpts, class_value))| SeasonTotal {
            player,
            position,
            owner,
            fpts,
            class_value,
        })
        .collect()
}

/// Rank owners by the total class value of their best lineup, where
/// starters are chosen by class value then FPTS.
pub fn power_rankings(store: &PlayerRecordStore, weeks: &[Week], rules: &LineupRules) -> Vec<PowerRanking> {
    let totals = season_totals(store, weeks);
    let mut by_owner: BTreeMap<&str, Vec<&SeasonTotal>> = BTreeMap::new();
    for t in &totals {
        by_owner.entry(t.owner.as_str()).or_default().push(t);
    }

    let order = rules.all_tags();
    let mut rankings: Vec<PowerRanking> = by_owner
        .into_iter()
        .map(|(owner, players)| {
            let candidates: Vec<LineupCandidate<'_>> = players
                .iter()
                .map(|t| LineupCandidate {
                    player: &t.player,
                    position: t.position,
                    values: vec![t.class_value, t.fpts],
                })
                .collect();
            let tags = assign_lineups(rules, &candidates);
            let mut slots: Vec<RankingSlot> = players
                .iter()
                .zip(tags)
                .filter_map(|(t, tag)| {
                    tag.map(|slot| RankingSlot {
                        slot,
                        player: t.player.clone(),
                        class_value: t.class_value,
                        fpts: t.fpts,
                    })
                })
                .collect();
            slots.sort_by_key(|s| order.iter().position(|tag| *tag == s.slot));
            PowerRanking {
                owner: owner.to_string(),
                total_class: slots.iter().map(|s| s.class_value).sum(),
                total_fpts: slots.iter().map(|s| s.fpts).sum(),
                slots,
            }
        })
        .collect();

    rankings.sort_by(|a, b| {
        b.total_class
            .partial_cmp(&a.total_class)
            .unwrap_or(Ordering::Equal)
            .then(b.total_fpts.partial_cmp(&a.total_fpts).unwrap_or(Ordering::Equal))
            .then(a.owner.cmp(&b.owner))
    });
    info!(owners = rankings.len(), "power rankings computed");
    rankings
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use gridcast_core::config::LineupSlot;
    use gridcast_core::player::{Participation, PlayerObservation};

    use super::*;

    fn wk(n: u8) -> Week {
        Week::new(n).unwrap()
    }

    fn obs(player: &str, pos: Position, owner: Option<&str>, week: u8, fpts: f64) -> PlayerObservation {
        PlayerObservation {
            player: player.into(),
            team: "KC".into(),
            position: pos,
            week: wk(week),
            opponent: Some("LV".into()),
            owner: owner.map(str::to_string),
            stats: BTreeMap::from([("FPTS".to_string(), fpts)]),
            participation: Participation::Played,
        }
    }

    fn rules() -> LineupRules {
        LineupRules::new(
            &[
                LineupSlot { slot: "QB".into(), count: 1 },
                LineupSlot { slot: "WR".into(), count: 1 },
                LineupSlot { slot: "FLEX".into(), count: 1 },
            ],
            &[Position::WideReceiver],
        )
        .unwrap()
    }

    #[test]
    fn totals_sum_points_and_classes() {
        let store = PlayerRecordStore::new(vec![
            obs("Q", Position::Quarterback, Some("AC"), 1, 22.0),
            obs("Q", Position::Quarterback, Some("AC"), 2, 9.0),
            obs("F", Position::WideReceiver, None, 1, 30.0),
        ]);
        let totals = season_totals(&store, &[wk(1), wk(2)]);
        assert_eq!(totals.len(), 1);
        assert_eq!(totals[0].fpts, 31.0);
        // class 3 plus class 0
        assert_eq!(totals[0].class_value, 3.0);
    }

    #[test]
    fn owners_ranked_by_starting_class_value() {
        let store = PlayerRecordStore::new(vec![
            obs("Q1", Position::Quarterback, Some("AC"), 1, 12.0),
            obs("W1", Position::WideReceiver, Some("AC"), 1, 16.0),
            obs("W2", Position::WideReceiver, Some("AC"), 1, 11.0),
            obs("W3", Position::WideReceiver, Some("AC"), 1, 5.0),
            obs("Q2", Position::Quarterback, Some("BD"), 1, 26.0),
            obs("W4", Position::WideReceiver, Some("BD"), 1, 21.0),
        ]);
        let rankings = power_rankings(&store, &[wk(1)], &rules());
        assert_eq!(rankings.len(), 2);

        // BD: 4 + 3 = 7; AC: 1 + 2 + 1 = 4
        assert_eq!(rankings[0].owner, "BD");
        assert_eq!(rankings[0].total_class, 7.0);
        assert!(rankings[0].slot("FLEX").is_none());

        let ac = &rankings[1];
        assert_eq!(ac.total_class, 4.0);
        assert_eq!(ac.slot("WR").map(|s| s.player.as_str()), Some("W1"));
        assert_eq!(ac.slot("FLEX").map(|s| s.player.as_str()), Some("W2"));
        let slots: Vec<&str> = ac.slots.iter().map(|s| s.slot.as_str()).collect();
        assert_eq!(slots, vec!["QB", "WR", "FLEX"]);
    }
}
