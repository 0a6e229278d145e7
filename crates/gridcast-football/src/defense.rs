// Defense factors: how generous each opponent is to each position, scaled
// against the league mean and minimum.

use std::collections::{BTreeMap, HashMap};

use gridcast_core::aggregate::mean;
use gridcast_core::error::ModelError;
use gridcast_core::player::{PlayerRecordStore, Position};
use gridcast_core::week::Week;
use tracing::{debug, info};

/// Allowed deviation from zero for the per-(position, stat) factor sum.
pub const CONSISTENCY_TOLERANCE: f64 = 1e-5;

/// Threshold below which `mean - min` is treated as zero.
const SPREAD_EPSILON: f64 = 1e-12;

type FactorKey = (String, Position, String);

// ---------------------------------------------------------------------------
// Opponent aggregates
// ---------------------------------------------------------------------------

/// Per-(opponent, position, stat) aggregate of what the opponent allowed.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OpponentAggregates {
    values: BTreeMap<FactorKey, f64>,
}

impl OpponentAggregates {
    pub fn insert(&mut self, opponent: &str, position: Position, stat: &str, value: f64) {
        self.values
            .insert((opponent.to_string(), position, stat.to_string()), value);
    }

    pub fn get(&self, opponent: &str, position: Position, stat: &str) -> Option<f64> {
        self.values
            .get(&(opponent.to_string(), position, stat.to_string()))
            .copied()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Mean over weeks of the per-week sums each opponent allowed, keyed by
/// (opponent, position, stat). Only played rows with an opponent count.
fn weekly_allowed_means(
    store: &PlayerRecordStore,
    weeks: &[Week],
    stats: &[String],
) -> HashMap<FactorKey, f64> {
    let mut weekly: HashMap<(String, Position, Week), Vec<f64>> = HashMap::new();
    for row in store.in_weeks(weeks).filter(|r| r.played()) {
        let Some(opp) = &row.opponent else { continue };
        let sums = weekly
            .entry((opp.clone(), row.position, row.week))
            .or_insert_with(|| vec![0.0; stats.len()]);
        for (sum, stat) in sums.iter_mut().zip(stats) {
            *sum += row.stat(stat);
        }
    }

    let mut per_opponent: HashMap<FactorKey, Vec<f64>> = HashMap::new();
    for ((opp, pos, _), sums) in weekly {
        for (stat, sum) in stats.iter().zip(sums) {
            per_opponent
                .entry((opp.clone(), pos, stat.clone()))
                .or_default()
                .push(sum);
        }
    }

    per_opponent
        .into_iter()
        .filter_map(|(key, sums)| mean(&sums).map(|m| (key, m)))
        .collect()
}

/// Blend the season-long and recent opponent aggregates: the mean of the
/// two, or the season value alone when the recent window has none.
pub fn opponent_blended_averages(
    store: &PlayerRecordStore,
    all_weeks: &[Week],
    recent_weeks: &[Week],
    stats: &[String],
) -> Result<OpponentAggregates, ModelError> {
    for stat in stats {
        store.require_stat(stat)?;
    }
    let season = weekly_allowed_means(store, all_weeks, stats);
    let recent = weekly_allowed_means(store, recent_weeks, stats);

    let mut blended = OpponentAggregates::default();
    for (key, all_value) in season {
        let value = match recent.get(&key) {
            Some(l3) => (all_value + l3) / 2.0,
            None => all_value,
        };
        blended.values.insert(key, value);
    }
    debug!(entries = blended.len(), "opponent aggregates blended");
    Ok(blended)
}

// ---------------------------------------------------------------------------
// Defense factors
// ---------------------------------------------------------------------------

/// `(value - min) / (mean - min) - 1`, or 0 when the mean is 0 or there is
/// no spread between mean and minimum.
pub fn defense_factor(value: f64, mean: f64, min: f64) -> f64 {
    if mean == 0.0 || (mean - min).abs() < SPREAD_EPSILON {
        return 0.0;
    }
    (value - min) / (mean - min) - 1.0
}

/// Normalized factors keyed by (opponent, position, stat).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DefenseFactors {
    factors: BTreeMap<FactorKey, f64>,
}

impl DefenseFactors {
    pub fn from_entries<I>(entries: I) -> Self
    where
        I: IntoIterator<Item = (String, Position, String, f64)>,
    {
        DefenseFactors {
            factors: entries
                .into_iter()
                .map(|(opp, pos, stat, f)| ((opp, pos, stat), f))
                .collect(),
        }
    }

    pub fn factor(&self, opponent: &str, position: Position, stat: &str) -> Option<f64> {
        self.factors
            .get(&(opponent.to_string(), position, stat.to_string()))
            .copied()
    }

    pub fn len(&self) -> usize {
        self.factors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.factors.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, Position, &str, f64)> {
        self.factors
            .iter()
            .map(|((opp, pos, stat), f)| (opp.as_str(), *pos, stat.as_str(), *f))
    }

    /// Sum of factors across opponents for each (position, stat).
    pub fn sums(&self) -> BTreeMap<(Position, String), f64> {
        let mut sums: BTreeMap<(Position, String), f64> = BTreeMap::new();
        for ((_, pos, stat), f) in &self.factors {
            *sums.entry((*pos, stat.clone())).or_insert(0.0) += f;
        }
        sums
    }

    /// Every (position, stat) factor sum must lie within `tolerance` of 0.
    pub fn check_consistency(&self, tolerance: f64) -> Result<(), ModelError> {
        for ((position, stat), sum) in self.sums() {
            if !(sum.abs() <= tolerance) {
                return Err(ModelError::ConsistencyError {
                    position,
                    stat,
                    sum,
                    tolerance,
                });
            }
        }
        Ok(())
    }
}

/// Turns opponent aggregates into defense factors.
#[derive(Debug, Clone, Copy)]
pub struct DefenseFactorEngine {
    tolerance: f64,
}

impl Default for DefenseFactorEngine {
    fn default() -> Self {
        DefenseFactorEngine {
            tolerance: CONSISTENCY_TOLERANCE,
        }
    }
}

impl DefenseFactorEngine {
    pub fn with_tolerance(tolerance: f64) -> Self {
        DefenseFactorEngine { tolerance }
    }

    /// Factors for every aggregate, normalized per (position, stat), then
    /// checked for the zero-sum property.
    pub fn compute(&self, aggregates: &OpponentAggregates) -> Result<DefenseFactors, ModelError> {
        let mut groups: BTreeMap<(Position, &str), Vec<f64>> = BTreeMap::new();
        for ((_, pos, stat), value) in &aggregates.values {
            groups.entry((*pos, stat.as_str())).or_default().push(*value);
        }
        let bounds: BTreeMap<(Position, &str), (f64, f64)> = groups
            .into_iter()
            .filter_map(|(key, values)| {
                let m = mean(&values)?;
                let min = values.iter().copied().fold(f64::INFINITY, f64::min);
                Some((key, (m, min)))
            })
            .collect();

        let mut factors = BTreeMap::new();
        for ((opp, pos, stat), value) in &aggregates.values {
            let Some(&(m, min)) = bounds.get(&(*pos, stat.as_str())) else {
                continue;
            };
            factors.insert((opp.clone(), *pos, stat.clone()), defense_factor(*value, m, min));
        }

        let factors = DefenseFactors { factors };
        factors.check_consistency(self.tolerance)?;
        info!(factors = factors.len(), "defense factors computed");
        Ok(factors)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
