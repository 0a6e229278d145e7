// Week-by-week matchup simulation and standings accrual.

use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};

use gridcast_core::aggregate::round_cents;
use gridcast_core::error::ModelError;
use gridcast_core::player::Position;
use gridcast_core::schedule::{OwnerSchedule, StandingsRow};
use gridcast_core::week::Week;
use tracing::{debug, info};

use crate::lineup::{assign_lineups, LineupCandidate, LineupRules};
use crate::projection::PlayerProjection;

/// Sort key naming the projected points total.
pub const PROJ_FPTS_KEY: &str = "PROJ_FPTS";

// ---------------------------------------------------------------------------
// Lineups and weekly scores
// ---------------------------------------------------------------------------

/// A projected starter for one owner in one week.
#[derive(Debug, Clone, PartialEq)]
pub struct Starter {
    pub owner: String,
    pub week: Week,
    pub player: String,
    pub position: Position,
    pub slot: String,
    pub proj_fpts: f64,
}

fn sort_value(projection: &PlayerProjection, key: &str) -> f64 {
    if key == PROJ_FPTS_KEY {
        projection.proj_fpts
    } else {
        projection.stats.get(key).copied().unwrap_or(0.0)
    }
}

/// Pick each owner's starters in each week from the projections.
/// Unowned players never start.
pub fn select_starters(
    rules: &LineupRules,
    projections: &[PlayerProjection],
    weeks: &[Week],
    sort_keys: &[String],
) -> Vec<Starter> {
    let mut starters = Vec::new();
    for &week in weeks {
        let mut by_owner: BTreeMap<&str, Vec<&PlayerProjection>> = BTreeMap::new();
        for p in projections.iter().filter(|p| p.week == week) {
            if let Some(owner) = &p.owner {
                by_owner.entry(owner.as_str()).or_default().push(p);
            }
        }
        for (owner, players) in by_owner {
            let candidates: Vec<LineupCandidate<'_>> = players
                .iter()
                .map(|p| LineupCandidate {
                    player: &p.player,
                    position: p.position,
                    values: sort_keys.iter().map(|k| sort_value(p, k)).collect(),
                })
                .collect();
            let tags = assign_lineups(rules, &candidates);
            for (p, tag) in players.iter().zip(tags) {
                if let Some(slot) = tag {
                    starters.push(Starter {
                        owner: owner.to_string(),
                        week,
                        player: p.player.clone(),
                        position: p.position,
                        slot,
                        proj_fpts: p.proj_fpts,
                    });
                }
            }
        }
    }
    debug!(starters = starters.len(), "lineups selected");
    starters
}

/// Projected points per (owner, week), summed over starters only.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WeeklyScores {
    scores: BTreeMap<(String, Week), f64>,
}

impl WeeklyScores {
    /// Every owner in `owners` gets a zero entry for every week in `weeks`
    /// before starters are added.
    pub fn from_starters<'a, I>(starters: &[Starter], owners: I, weeks: &[Week]) -> Self
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut scores: BTreeMap<(String, Week), f64> = BTreeMap::new();
        for owner in owners {
            for &week in weeks {
                scores.insert((owner.to_string(), week), 0.0);
            }
        }
        for s in starters {
            *scores.entry((s.owner.clone(), s.week)).or_insert(0.0) += s.proj_fpts;
        }
        WeeklyScores { scores }
    }

    pub fn get(&self, owner: &str, week: Week) -> Option<f64> {
        self.scores.get(&(owner.to_string(), week)).copied()
    }

    pub fn owners(&self) -> BTreeSet<&str> {
        self.scores.keys().map(|(o, _)| o.as_str()).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, Week, f64)> {
        self.scores.iter().map(|((o, w), pts)| (o.as_str(), *w, *pts))
    }

    pub fn is_empty(&self) -> bool {
        self.scores.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Matchups
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchupOutcome {
    Win,
    Loss,
    Tie,
}

impl MatchupOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            MatchupOutcome::Win => "W",
            MatchupOutcome::Loss => "L",
            MatchupOutcome::Tie => "T",
        }
    }

    fn from_scores(score: f64, opponent_score: f64) -> Self {
        match score.partial_cmp(&opponent_score) {
            Some(Ordering::Greater) => MatchupOutcome::Win,
            Some(Ordering::Less) => MatchupOutcome::Loss,
            _ => MatchupOutcome::Tie,
        }
    }
}

/// One owner's side of one matchup. Scores are rounded to cents before
/// comparison.
#[derive(Debug, Clone, PartialEq)]
pub struct MatchupResult {
    pub owner: String,
    pub week: Week,
    pub opponent: String,
    pub points: f64,
    pub opponent_points: f64,
    pub outcome: MatchupOutcome,
    pub diff: f64,
}

fn integrity(owner: &str, week: Week, message: impl Into<String>) -> ModelError {
    ModelError::ScheduleIntegrityError {
        owner: owner.to_string(),
        week,
        message: message.into(),
    }
}

/// Resolve every scored owner's matchup in each non-playoff week.
///
/// Fails when an owner has no scheduled opponent, the pairing is not
/// mutual, or the opponent has no score for the week.
pub fn resolve_matchups(
    scores: &WeeklyScores,
    schedule: &OwnerSchedule,
    weeks: &[Week],
    playoff_weeks: &[Week],
) -> Result<Vec<MatchupResult>, ModelError> {
    let mut results = Vec::new();
    for &week in weeks.iter().filter(|w| !playoff_weeks.contains(w)) {
        for owner in scores.owners() {
            let Some(score) = scores.get(owner, week) else {
                continue;
            };
            let opponent = schedule
                .opponent_of(owner, week)
                .ok_or_else(|| integrity(owner, week, "no opponent scheduled"))?;
            if schedule.opponent_of(opponent, week) != Some(owner) {
                return Err(integrity(
                    owner,
                    week,
                    format!("opponent `{opponent}` is not scheduled against this owner"),
                ));
            }
            let opponent_score = scores
                .get(opponent, week)
                .ok_or_else(|| integrity(owner, week, format!("opponent `{opponent}` has no score")))?;

            let points = round_cents(score);
            let opponent_points = round_cents(opponent_score);
            results.push(MatchupResult {
                owner: owner.to_string(),
                week,
                opponent: opponent.to_string(),
                points,
                opponent_points,
                outcome: MatchupOutcome::from_scores(points, opponent_points),
                diff: round_cents(points - opponent_points),
            });
        }
    }
    debug!(results = results.len(), "matchups resolved");
    Ok(results)
}

// ---------------------------------------------------------------------------
// Standings
// ---------------------------------------------------------------------------

/// Wins, then ties, then points, all descending. Owner name settles the rest.
pub fn sort_standings(rows: &mut [StandingsRow]) {
    rows.sort_by(|a, b| {
        b.wins
            .cmp(&a.wins)
            .then(b.ties.cmp(&a.ties))
            .then(b.points.partial_cmp(&a.points).unwrap_or(Ordering::Equal))
            .then(a.owner.cmp(&b.owner))
    });
}

/// Add matchup outcomes and non-playoff projected points onto the current
/// standings. Every owner with a result must already have a standings row.
pub fn accrue_standings(
    current: &[StandingsRow],
    results: &[MatchupResult],
    scores: &WeeklyScores,
    playoff_weeks: &[Week],
) -> Result<Vec<StandingsRow>, ModelError> {
    let mut table: BTreeMap<String, StandingsRow> = current
        .iter()
        .map(|row| (row.owner.clone(), row.clone()))
        .collect();

    for result in results {
        let row = table
            .get_mut(&result.owner)
            .ok_or_else(|| integrity(&result.owner, result.week, "owner missing from current standings"))?;
        match result.outcome {
            MatchupOutcome::Win => row.wins += 1,
            MatchupOutcome::Loss => row.losses += 1,
            MatchupOutcome::Tie => row.ties += 1,
        }
    }

    let mut added: BTreeMap<&str, f64> = BTreeMap::new();
    for (owner, week, pts) in scores.iter() {
        if playoff_weeks.contains(&week) {
            continue;
        }
        *added.entry(owner).or_insert(0.0) += pts;
    }
    for (owner, pts) in added {
        if let Some(row) = table.get_mut(owner) {
            row.points = round_cents(row.points + pts);
        }
    }

    let mut rows: Vec<StandingsRow> = table.into_values().collect();
    sort_standings(&mut rows);
    Ok(rows)
}

// ---------------------------------------------------------------------------
// Simulator
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default)]
pub struct SimulationOutcome {
    pub starters: Vec<Starter>,
    pub scores: WeeklyScores,
    pub matchups: Vec<MatchupResult>,
    pub standings: Vec<StandingsRow>,
}

/// Lineups, weekly scores, matchups, then standings over the future weeks.
#[derive(Debug, Clone)]
pub struct StandingsSimulator {
    rules: LineupRules,
    sort_keys: Vec<String>,
    playoff_weeks: Vec<Week>,
}

impl StandingsSimulator {
    pub fn new(rules: LineupRules, sort_keys: Vec<String>, playoff_weeks: Vec<Week>) -> Self {
        StandingsSimulator {
            rules,
            sort_keys,
            playoff_weeks,
        }
    }

    pub fn simulate(
        &self,
        projections: &[PlayerProjection],
        future_weeks: &[Week],
        schedule: &OwnerSchedule,
        current: &[StandingsRow],
    ) -> Result<SimulationOutcome, ModelError> {
        let starters = select_starters(&self.rules, projections, future_weeks, &self.sort_keys);
        let scores = WeeklyScores::from_starters(&starters, schedule.owners(), future_weeks);
        let matchups = resolve_matchups(&scores, schedule, future_weeks, &self.playoff_weeks)?;
        let standings = accrue_standings(current, &matchups, &scores, &self.playoff_weeks)?;
        info!(
            weeks = future_weeks.len(),
            matchups = matchups.len(),
            owners = standings.len(),
            "standings simulated"
        );
        Ok(SimulationOutcome {
            starters,
            scores,
            matchups,
            standings,
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
