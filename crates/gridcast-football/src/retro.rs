// Retrospective stat aggregation: trailing player averages and the
// opponent-position aggregates they are paired with.

use std::collections::HashMap;

use gridcast_core::aggregate::{mean, round_cents, round_whole, CalcType, WindowMode};
use gridcast_core::error::ModelError;
use gridcast_core::player::{Participation, PlayerRecordStore, Position};
use gridcast_core::week::{Week, WeekIndex, WeekSelector};
use tracing::debug;

// ---------------------------------------------------------------------------
// Request / result types
// ---------------------------------------------------------------------------

/// One retrospective column to compute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetroRequest {
    pub stat: String,
    pub window: WindowMode,
    pub calc: CalcType,
    /// Fold the target week itself into its window.
    pub include_current: bool,
    /// Also compute the opponent-position aggregate.
    pub with_opponent: bool,
    /// Restrict target rows to one position.
    pub position: Option<Position>,
}

impl RetroRequest {
    pub fn new(stat: impl Into<String>, window: WindowMode, calc: CalcType) -> Self {
        RetroRequest {
            stat: stat.into(),
            window,
            calc,
            include_current: false,
            with_opponent: false,
            position: None,
        }
    }

    pub fn including_current(mut self, include: bool) -> Self {
        self.include_current = include;
        self
    }

    pub fn with_opponent(mut self, with_opponent: bool) -> Self {
        self.with_opponent = with_opponent;
        self
    }

    pub fn for_position(mut self, position: Position) -> Self {
        self.position = Some(position);
        self
    }

    /// Player column name, e.g. `AVGL3_FPTS`.
    pub fn column_name(&self) -> String {
        format!("{}{}_{}", self.calc.label(), self.window.label(), self.stat)
    }

    /// Opponent column name, e.g. `OPPAVGL3_FPTS`.
    pub fn opponent_column_name(&self) -> String {
        format!("OPP{}", self.column_name())
    }
}

/// A player's retrospective value for one target week.
#[derive(Debug, Clone, PartialEq)]
pub struct RetroValue {
    pub player: String,
    pub position: Position,
    pub opponent: Option<String>,
    pub value: f64,
    /// Window weeks the player actually played.
    pub played_weeks: usize,
    /// Opponent-position aggregate, when requested and the row has an opponent.
    pub opponent_value: Option<f64>,
}

/// All players' values for one (target week, request).
#[derive(Debug, Clone, PartialEq)]
pub struct RetroColumn {
    pub week: Week,
    pub window: Vec<Week>,
    pub values: Vec<RetroValue>,
    pub cache_hits: usize,
    pub cache_misses: usize,
}

impl RetroColumn {
    pub fn get(&self, player: &str) -> Option<&RetroValue> {
        self.values.iter().find(|v| v.player == player)
    }
}

// ---------------------------------------------------------------------------
// Uncached window computations
// ---------------------------------------------------------------------------

/// A player's trailing value over `window`, with the number of played weeks.
///
/// Only PLAYED observations count: OUT weeks add nothing to the numerator or
/// the denominator, and BYE or absent weeks are not observations at all. An
/// empty denominator averages to 0. Results are rounded to whole numbers.
pub fn player_window_value(
    store: &PlayerRecordStore,
    player: &str,
    window: &[Week],
    stat: &str,
    calc: CalcType,
) -> (f64, usize) {
    let mut total = 0.0;
    let mut played = 0usize;
    for &week in window {
        if let Some(row) = store.get(player, week) {
            if row.participation == Participation::Played {
                total += row.stat(stat);
                played += 1;
            }
        }
    }
    let value = match calc {
        CalcType::Sum => total,
        CalcType::Avg if played == 0 => 0.0,
        CalcType::Avg => total / played as f64,
    };
    (round_whole(value), played)
}

/// What `position` players produced against `opponent` over `window`.
///
/// Each week's value is the sum over every same-position player who faced
/// the opponent; AVG averages those weekly sums over the weeks that had any,
/// SUM totals them. Rounded to two decimals.
pub fn opponent_window_value(
    store: &PlayerRecordStore,
    window: &[Week],
    opponent: &str,
    position: Position,
    stat: &str,
    calc: CalcType,
) -> f64 {
    let weekly: Vec<f64> = window
        .iter()
        .filter_map(|&week| {
            let mut faced = store.in_week(week).filter(|r| {
                r.played() && r.position == position && r.opponent.as_deref() == Some(opponent)
            });
            let first = faced.next()?;
            Some(first.stat(stat) + faced.map(|r| r.stat(stat)).sum::<f64>())
        })
        .collect();
    let value = match calc {
        CalcType::Sum => weekly.iter().sum(),
        CalcType::Avg => mean(&weekly).unwrap_or(0.0),
    };
    round_cents(value)
}

// ---------------------------------------------------------------------------
// Aggregator
// ---------------------------------------------------------------------------

/// Computes retrospective columns over an immutable store snapshot.
pub struct RetroAggregator<'a> {
    store: &'a PlayerRecordStore,
    weeks: &'a WeekIndex,
}

impl<'a> RetroAggregator<'a> {
    pub fn new(store: &'a PlayerRecordStore, weeks: &'a WeekIndex) -> Self {
        RetroAggregator { store, weeks }
    }

    /// Values for every player observed in `target` (BYE rows skipped).
    ///
    /// The opponent aggregate is computed once per (week, opponent, position)
    /// and shared by every player in that group.
    pub fn compute(&self, target: Week, request: &RetroRequest) -> Result<RetroColumn, ModelError> {
        self.store.require_stat(&request.stat)?;
        let window = self
            .weeks
            .retro_window(target, request.window, request.include_current)?;

        let mut cache: HashMap<(Week, String, Position), f64> = HashMap::new();
        let mut hits = 0usize;
        let mut misses = 0usize;

        let mut targets: Vec<_> = self
            .store
            .in_week(target)
            .filter(|r| r.participation != Participation::Bye)
            .filter(|r| request.position.map_or(true, |p| p == r.position))
            .collect();
        targets.sort_by(|a, b| a.player.cmp(&b.player));

        let mut values = Vec::with_capacity(targets.len());
        for row in targets {
            let (value, played_weeks) =
                player_window_value(self.store, &row.player, &window, &request.stat, request.calc);

            let opponent_value = match (&row.opponent, request.with_opponent) {
                (Some(opp), true) => {
                    let key = (target, opp.clone(), row.position);
                    let v = match cache.get(&key) {
                        Some(&v) => {
                            hits += 1;
                            v
                        }
                        None => {
                            misses += 1;
                            let v = opponent_window_value(
                                self.store,
                                &window,
                                opp,
                                row.position,
                                &request.stat,
                                request.calc,
                            );
                            cache.insert(key, v);
                            v
                        }
                    };
                    Some(v)
                }
                _ => None,
            };

            values.push(RetroValue {
                player: row.player.clone(),
                position: row.position,
                opponent: row.opponent.clone(),
                value,
                played_weeks,
                opponent_value,
            });
        }

        debug!(
            week = %target,
            column = %request.column_name(),
            rows = values.len(),
            cache_hits = hits,
            cache_misses = misses,
            "retro column computed"
        );

        Ok(RetroColumn {
            week: target,
            window,
            values,
            cache_hits: hits,
            cache_misses: misses,
        })
    }

    /// One column per resolved target week.
    pub fn compute_selected(
        &self,
        selector: &WeekSelector,
        request: &RetroRequest,
    ) -> Result<Vec<RetroColumn>, ModelError> {
        self.weeks
            .resolve_targets(selector, request.include_current)?
            .into_iter()
            .map(|week| self.compute(week, request))
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
