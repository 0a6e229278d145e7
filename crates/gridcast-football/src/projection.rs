// Forward projections: blended player baselines adjusted by opponent
// defense factors and converted to fantasy points.

use std::collections::{BTreeMap, HashMap};

use gridcast_core::error::ModelError;
use gridcast_core::player::{Participation, PlayerObservation, PlayerRecordStore, Position};
use gridcast_core::roster::TeamPositionMap;
use gridcast_core::schedule::{NflSchedule, Opponent};
use gridcast_core::week::Week;
use tracing::{debug, info, warn};

use crate::defense::DefenseFactors;

/// Team marker for players without an NFL team.
const FREE_AGENT_TEAM: &str = "FA";

// ---------------------------------------------------------------------------
// Data preparation
// ---------------------------------------------------------------------------

/// Keep only rows that describe a game actually played by a rostered NFL
/// player. Missing opponents are taken from the schedule; a row whose
/// scheduled opponent turns out to be a bye is dropped.
pub fn prepare_projection_data(store: &PlayerRecordStore, schedule: &NflSchedule) -> PlayerRecordStore {
    let mut dropped = 0usize;
    let rows: Vec<PlayerObservation> = store
        .rows()
        .iter()
        .filter_map(|row| {
            if row.team.is_empty() || row.team.eq_ignore_ascii_case(FREE_AGENT_TEAM) {
                dropped += 1;
                return None;
            }
            if row.participation != Participation::Played {
                dropped += 1;
                return None;
            }
            if row.opponent.is_some() {
                return Some(row.clone());
            }
            match schedule.opponent(&row.team, row.week) {
                Some(Opponent::Team(opp)) => Some(PlayerObservation {
                    opponent: Some(opp.clone()),
                    ..row.clone()
                }),
                Some(Opponent::Bye) => {
                    dropped += 1;
                    None
                }
                None => Some(row.clone()),
            }
        })
        .collect();
    debug!(kept = rows.len(), dropped, "projection data prepared");
    PlayerRecordStore::from_parts(rows, store.stat_columns().clone())
}

// ---------------------------------------------------------------------------
// Player baselines
// ---------------------------------------------------------------------------

/// A player's blended per-game averages.
#[derive(Debug, Clone, PartialEq)]
pub struct PlayerBaseline {
    pub player: String,
    pub position: Position,
    pub owner: Option<String>,
    pub stats: BTreeMap<String, f64>,
}

type BaselineKey = (String, Position, Option<String>);

/// Per-stat means over played rows. A row without a value for a stat is left
/// out of that stat's count; a stat no row carries has no mean.
fn per_game_means(
    store: &PlayerRecordStore,
    weeks: &[Week],
    stats: &[String],
) -> HashMap<BaselineKey, Vec<Option<f64>>> {
    let mut sums: HashMap<BaselineKey, Vec<(f64, usize)>> = HashMap::new();
    for row in store.in_weeks(weeks).filter(|r| r.played()) {
        let entry = sums
            .entry((row.player.clone(), row.position, row.owner.clone()))
            .or_insert_with(|| vec![(0.0, 0); stats.len()]);
        for ((sum, games), stat) in entry.iter_mut().zip(stats) {
            if let Some(v) = row.stat_opt(stat) {
                *sum += v;
                *games += 1;
            }
        }
    }
    sums.into_iter()
        .map(|(key, totals)| {
            let means = totals
                .into_iter()
                .map(|(t, games)| (games > 0).then(|| t / games as f64))
                .collect();
            (key, means)
        })
        .collect()
}

/// Season-long and recent per-game means blended as their average, or
/// whichever of the two exists alone. Sorted by player.
pub fn blend_player_baselines(
    store: &PlayerRecordStore,
    all_weeks: &[Week],
    recent_weeks: &[Week],
    stats: &[String],
) -> Result<Vec<PlayerBaseline>, ModelError> {
    for stat in stats {
        store.require_stat(stat)?;
    }
    let season = per_game_means(store, all_weeks, stats);
    let recent = per_game_means(store, recent_weeks, stats);

    let mut baselines: Vec<PlayerBaseline> = season
        .into_iter()
        .map(|(key, season_means)| {
            let recent_means = recent.get(&key);
            let blended: BTreeMap<String, f64> = stats
                .iter()
                .enumerate()
                .filter_map(|(i, stat)| {
                    let r = recent_means.and_then(|m| m[i]);
                    let value = match (season_means[i], r) {
                        (Some(s), Some(r)) => (s + r) / 2.0,
                        (Some(v), None) | (None, Some(v)) => v,
                        (None, None) => return None,
                    };
                    Some((stat.clone(), value))
                })
                .collect();
            let (player, position, owner) = key;
            PlayerBaseline {
                player,
                position,
                owner,
                stats: blended,
            }
        })
        .collect();
    baselines.sort_by(|a, b| a.player.cmp(&b.player).then(a.position.cmp(&b.position)));
    Ok(baselines)
}

/// Remove players with no fantasy owner.
pub fn drop_free_agents(baselines: Vec<PlayerBaseline>) -> Vec<PlayerBaseline> {
    let before = baselines.len();
    let kept: Vec<PlayerBaseline> = baselines.into_iter().filter(|b| b.owner.is_some()).collect();
    debug!(dropped = before - kept.len(), "free agents dropped from projections");
    kept
}

// ---------------------------------------------------------------------------
// Projection engine
// ---------------------------------------------------------------------------

/// One player's projected line for one future week.
#[derive(Debug, Clone, PartialEq)]
pub struct PlayerProjection {
    pub player: String,
    pub team: String,
    pub position: Position,
    pub owner: Option<String>,
    pub week: Week,
    pub opponent: String,
    pub stats: BTreeMap<String, f64>,
    pub proj_fpts: f64,
}

/// Projections plus the row-level failures skipped along the way.
#[derive(Debug, Clone, Default)]
pub struct ProjectionRun {
    pub projections: Vec<PlayerProjection>,
    pub issues: Vec<ModelError>,
}

impl ProjectionRun {
    pub fn in_week(&self, week: Week) -> impl Iterator<Item = &PlayerProjection> {
        self.projections.iter().filter(move |p| p.week == week)
    }
}

#[derive(Debug, Clone)]
pub struct ProjectionEngine {
    stats: Vec<String>,
    scoring: BTreeMap<String, f64>,
    defense_weight: f64,
}

impl ProjectionEngine {
    /// Track `stats`, each of which must be a column of `store`.
    pub fn new(
        store: &PlayerRecordStore,
        stats: Vec<String>,
        scoring: BTreeMap<String, f64>,
        defense_weight: f64,
    ) -> Result<Self, ModelError> {
        for stat in &stats {
            store.require_stat(stat)?;
        }
        Ok(ProjectionEngine {
            stats,
            scoring,
            defense_weight,
        })
    }

    /// Track every scored statistic the store has a column for. Scored
    /// statistics without a column are logged and left out.
    pub fn for_scoring(
        store: &PlayerRecordStore,
        scoring: BTreeMap<String, f64>,
        defense_weight: f64,
    ) -> Self {
        let (stats, missing): (Vec<String>, Vec<String>) =
            scoring.keys().cloned().partition(|s| store.has_stat(s));
        if !missing.is_empty() {
            warn!(stats = ?missing, "scored statistics absent from the data; not projected");
        }
        ProjectionEngine {
            stats,
            scoring,
            defense_weight,
        }
    }

    pub fn stats(&self) -> &[String] {
        &self.stats
    }

    pub fn defense_weight(&self) -> f64 {
        self.defense_weight
    }

    /// `blended * (1 + factor * weight)`; a missing factor counts as zero.
    pub fn project_stat(&self, blended: f64, factor: Option<f64>) -> f64 {
        blended * (1.0 + factor.unwrap_or(0.0) * self.defense_weight)
    }

    /// Project every baseline into every future week. Bye weeks produce no
    /// row; players or schedule entries that cannot be resolved are
    /// reported in [`ProjectionRun::issues`] and skipped.
    pub fn project(
        &self,
        baselines: &[PlayerBaseline],
        teams: &TeamPositionMap,
        schedule: &NflSchedule,
        future_weeks: &[Week],
        factors: &DefenseFactors,
    ) -> ProjectionRun {
        let mut run = ProjectionRun::default();

        let mut resolved: Vec<(&PlayerBaseline, &str)> = Vec::with_capacity(baselines.len());
        for baseline in baselines {
            match teams.team_of(&baseline.player) {
                Some(team) => resolved.push((baseline, team)),
                None => {
                    warn!(player = %baseline.player, "no current team; player not projected");
                    run.issues.push(ModelError::UnresolvedPlayer {
                        player: baseline.player.clone(),
                    });
                }
            }
        }

        for &week in future_weeks {
            for &(baseline, team) in &resolved {
                let opponent = match schedule.opponent(team, week) {
                    Some(Opponent::Team(opp)) => opp,
                    Some(Opponent::Bye) => continue,
                    None => {
                        warn!(player = %baseline.player, team, week = %week, "no schedule entry");
                        run.issues.push(ModelError::UnresolvedSchedule {
                            player: baseline.player.clone(),
                            team: team.to_string(),
                            week,
                        });
                        continue;
                    }
                };
                run.projections
                    .push(self.project_one(baseline, team, week, opponent, factors));
            }
        }

        info!(
            projections = run.projections.len(),
            issues = run.issues.len(),
            weeks = future_weeks.len(),
            "player projections computed"
        );
        run
    }

    fn project_one(
        &self,
        baseline: &PlayerBaseline,
        team: &str,
        week: Week,
        opponent: &str,
        factors: &DefenseFactors,
    ) -> PlayerProjection {
        let mut stats = BTreeMap::new();
        let mut proj_fpts = 0.0;
        for stat in &self.stats {
            let blended = baseline.stats.get(stat).copied().unwrap_or(0.0);
            let factor = factors.factor(opponent, baseline.position, stat);
            let projected = self.project_stat(blended, factor);
            proj_fpts += projected * self.scoring.get(stat).copied().unwrap_or(0.0);
            stats.insert(stat.clone(), projected);
        }
        PlayerProjection {
            player: baseline.player.clone(),
            team: team.to_string(),
            position: baseline.position,
            owner: baseline.owner.clone(),
            week,
            opponent: opponent.to_string(),
            stats,
            proj_fpts,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn wk(n: u8) -> Week {
        Week::new(n).unwrap()
    }

    fn approx_eq(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    fn obs(player: &str, team: &str, week: u8, opp: Option<&str>, yds: f64, td: f64) -> PlayerObservation {
        PlayerObservation {
            player: player.into(),
            team: team.into(),
            position: Position::RunningBack,
            week: wk(week),
            opponent: opp.map(str::to_string),
            owner: Some("AC".into()),
            stats: BTreeMap::from([("RUYDS".to_string(), yds), ("RUTD".to_string(), td)]),
            participation: Participation::Played,
        }
    }

    fn stats() -> Vec<String> {
        vec!["RUYDS".into(), "RUTD".into()]
    }

    fn scoring() -> BTreeMap<String, f64> {
        BTreeMap::from([("RUYDS".to_string(), 0.1), ("RUTD".to_string(), 6.0)])
    }

    fn schedule() -> NflSchedule {
        NflSchedule::from_entries(vec![
            ("PHI".into(), wk(3), Opponent::Team("DAL".into())),
            ("PHI".into(), wk(4), Opponent::Bye),
            ("PHI".into(), wk(5), Opponent::Team("NYG".into())),
            ("DAL".into(), wk(4), Opponent::Team("NYG".into())),
        ])
    }

    #[test]
    fn preparation_drops_free_agents_and_non_played_rows() {
        let mut out = obs("B", "PHI", 1, Some("DAL"), 0.0, 0.0);
        out.participation = Participation::Out;
        let store = PlayerRecordStore::new(vec![
            obs("A", "PHI", 1, Some("DAL"), 80.0, 1.0),
            obs("C", "FA", 1, Some("DAL"), 10.0, 0.0),
            out,
            obs("A", "PHI", 3, None, 60.0, 0.0),
            obs("A", "PHI", 4, None, 0.0, 0.0),
        ]);
        let prepared = prepare_projection_data(&store, &schedule());
        assert_eq!(prepared.len(), 2);
        assert_eq!(
            prepared.get("A", wk(3)).and_then(|r| r.opponent.as_deref()),
            Some("DAL")
        );
        assert!(prepared.get("A", wk(4)).is_none());
        assert!(prepared.has_stat("RUYDS"));
    }

    #[test]
    fn baselines_blend_season_and_recent() {
        let store = PlayerRecordStore::new(vec![
            obs("A", "PHI", 1, Some("DAL"), 100.0, 1.0),
            obs("A", "PHI", 2, Some("DAL"), 50.0, 0.0),
            obs("A", "PHI", 3, Some("DAL"), 60.0, 2.0),
            obs("B", "PHI", 1, Some("DAL"), 40.0, 0.0),
        ]);
        let all = [wk(1), wk(2), wk(3)];
        let recent = [wk(2), wk(3)];
        let baselines = blend_player_baselines(&store, &all, &recent, &stats()).unwrap();
        assert_eq!(baselines.len(), 2);

        let a = &baselines[0];
        assert_eq!(a.player, "A");
        // season 70, recent 55
        assert!(approx_eq(a.stats["RUYDS"], 62.5));
        // season 1, recent 1
        assert!(approx_eq(a.stats["RUTD"], 1.0));

        // no recent games: season value alone
        let b = &baselines[1];
        assert!(approx_eq(b.stats["RUYDS"], 40.0));
    }

    #[test]
    fn baselines_skip_absent_cells() {
        let mut blank = obs("A", "PHI", 2, Some("DAL"), 0.0, 0.0);
        blank.stats.remove("RUTD");
        let mut no_td = obs("B", "PHI", 1, Some("DAL"), 30.0, 0.0);
        no_td.stats.remove("RUTD");
        let store = PlayerRecordStore::new(vec![obs("A", "PHI", 1, Some("DAL"), 80.0, 2.0), blank, no_td]);
        let all = [wk(1), wk(2)];
        let baselines = blend_player_baselines(&store, &all, &[wk(2)], &stats()).unwrap();

        let a = &baselines[0];
        // season RUYDS 40, recent 0
        assert!(approx_eq(a.stats["RUYDS"], 20.0));
        // week 2 has no RUTD cell: season mean 2 over one game, no recent value
        assert!(approx_eq(a.stats["RUTD"], 2.0));

        let b = &baselines[1];
        assert!(approx_eq(b.stats["RUYDS"], 30.0));
        assert!(!b.stats.contains_key("RUTD"));
    }

    #[test]
    fn baselines_reject_unknown_stat() {
        let store = PlayerRecordStore::new(vec![obs("A", "PHI", 1, Some("DAL"), 100.0, 1.0)]);
        let err = blend_player_baselines(&store, &[wk(1)], &[wk(1)], &["PAYDS".to_string()]).unwrap_err();
        match err {
            ModelError::InvalidStatistic { stat } => assert_eq!(stat, "PAYDS"),
            other => panic!("expected InvalidStatistic, got {other:?}"),
        }
    }

    #[test]
    fn projection_applies_factor_and_scoring() {
        let store = PlayerRecordStore::new(vec![obs("A", "PHI", 1, Some("DAL"), 100.0, 1.0)]);
        let engine = ProjectionEngine::new(&store, stats(), scoring(), 0.5).unwrap();
        let teams = TeamPositionMap::from_store(&store, &[wk(1)]);
        let baselines = vec![PlayerBaseline {
            player: "A".into(),
            position: Position::RunningBack,
            owner: Some("AC".into()),
            stats: BTreeMap::from([("RUYDS".to_string(), 100.0), ("RUTD".to_string(), 1.0)]),
        }];
        let factors = DefenseFactors::from_entries(vec![
            ("DAL".to_string(), Position::RunningBack, "RUYDS".to_string(), 0.2),
            ("NYG".to_string(), Position::RunningBack, "RUYDS".to_string(), -0.2),
        ]);

        let run = engine.project(&baselines, &teams, &schedule(), &[wk(3), wk(4), wk(5)], &factors);
        assert!(run.issues.is_empty());
        // bye in week 4 produces no row
        assert_eq!(run.projections.len(), 2);

        let w3 = run.in_week(wk(3)).next().unwrap();
        assert_eq!(w3.opponent, "DAL");
        assert!(approx_eq(w3.stats["RUYDS"], 110.0));
        // no RUTD factor for DAL: unchanged
        assert!(approx_eq(w3.stats["RUTD"], 1.0));
        assert!(approx_eq(w3.proj_fpts, 11.0 + 6.0));

        let w5 = run.in_week(wk(5)).next().unwrap();
        assert!(approx_eq(w5.stats["RUYDS"], 90.0));
        assert!(approx_eq(w5.proj_fpts, 9.0 + 6.0));
    }

    #[test]
    fn unresolved_rows_are_reported_not_fatal() {
        let store = PlayerRecordStore::new(vec![obs("A", "PHI", 1, Some("DAL"), 100.0, 1.0)]);
        let engine = ProjectionEngine::new(&store, stats(), scoring(), 0.4).unwrap();
        let teams = TeamPositionMap::from_store(&store, &[wk(1)]);
        let baselines = vec![
            PlayerBaseline {
                player: "A".into(),
                position: Position::RunningBack,
                owner: None,
                stats: BTreeMap::from([("RUYDS".to_string(), 50.0)]),
            },
            PlayerBaseline {
                player: "Ghost".into(),
                position: Position::RunningBack,
                owner: None,
                stats: BTreeMap::new(),
            },
        ];
        // week 6 is missing from the schedule
        let run = engine.project(&baselines, &teams, &schedule(), &[wk(5), wk(6)], &DefenseFactors::default());
        assert_eq!(run.projections.len(), 1);
        assert_eq!(run.issues.len(), 2);
        assert!(run.issues.iter().all(ModelError::is_row_level));
        assert!(matches!(run.issues[0], ModelError::UnresolvedPlayer { .. }));
        assert!(matches!(run.issues[1], ModelError::UnresolvedSchedule { .. }));
    }

    #[test]
    fn scoring_engine_skips_absent_columns() {
        let store = PlayerRecordStore::new(vec![obs("A", "PHI", 1, Some("DAL"), 100.0, 1.0)]);
        let mut table = scoring();
        table.insert("FG50".into(), 5.0);
        let engine = ProjectionEngine::for_scoring(&store, table, 0.4);
        assert_eq!(engine.stats(), &["RUTD".to_string(), "RUYDS".to_string()]);
        assert!(ProjectionEngine::new(&store, vec!["FG50".into()], scoring(), 0.4).is_err());
    }

    #[test]
    fn free_agents_dropped() {
        let baselines = vec![
            PlayerBaseline {
                player: "A".into(),
                position: Position::RunningBack,
                owner: Some("AC".into()),
                stats: BTreeMap::new(),
            },
            PlayerBaseline {
                player: "B".into(),
                position: Position::RunningBack,
                owner: None,
                stats: BTreeMap::new(),
            },
        ];
        let kept = drop_free_agents(baselines);
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].player, "A");
    }
}
