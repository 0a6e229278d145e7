// Per-position feature table for the points model.

use std::collections::HashMap;

use gridcast_core::config::FeaturesConfig;
use gridcast_core::error::ModelError;
use gridcast_core::player::{PlayerRecordStore, Position};
use gridcast_core::week::{Week, WeekIndex, WeekSelector};
use tracing::info;

use crate::retro::{RetroAggregator, RetroRequest};

/// Upper bounds of the FPTS classes below the top one.
const FPTS_CLASS_BOUNDS: [f64; 4] = [10.0, 15.0, 20.0, 25.0];

/// Identity columns that lead every feature table.
pub const IDENTITY_COLUMNS: [&str; 6] = ["PLAYER", "TEAM", "POS", "WEEK", "OPPONENT", "FPTS"];

/// Ordinal points bucket: <10 is 0, [10,15) is 1, [15,20) is 2,
/// [20,25) is 3, 25 and up is 4.
pub fn fpts_class(fpts: f64) -> u8 {
    FPTS_CLASS_BOUNDS.iter().filter(|&&b| fpts >= b).count() as u8
}

#[derive(Debug, Clone, PartialEq)]
pub struct FeatureRow {
    pub player: String,
    pub team: String,
    pub position: Position,
    pub week: Week,
    pub opponent: Option<String>,
    pub fpts: f64,
    /// Aligned with [`FeatureTable::feature_columns`].
    pub features: Vec<f64>,
    pub fpts_class: u8,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FeatureTable {
    pub position: Position,
    pub feature_columns: Vec<String>,
    pub rows: Vec<FeatureRow>,
}

impl FeatureTable {
    /// Full header: identity columns, feature columns, then `FPTS_CLASS`.
    pub fn headers(&self) -> Vec<String> {
        IDENTITY_COLUMNS
            .iter()
            .map(|s| s.to_string())
            .chain(self.feature_columns.iter().cloned())
            .chain(std::iter::once("FPTS_CLASS".to_string()))
            .collect()
    }

    pub fn value(&self, row: &FeatureRow, column: &str) -> Option<f64> {
        self.feature_columns
            .iter()
            .position(|c| c == column)
            .and_then(|i| row.features.get(i).copied())
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Build the feature table for `position` over the selected target weeks.
///
/// For each `with_opponent` stat the player column is followed by its `OPP`
/// column; `without_opponent` stats get a player column only. Rows without a
/// played FPTS value are dropped.
pub fn build_feature_table(
    store: &PlayerRecordStore,
    weeks: &WeekIndex,
    position: Position,
    config: &FeaturesConfig,
    selector: &WeekSelector,
) -> Result<FeatureTable, ModelError> {
    store.require_stat("FPTS")?;
    let stats = config.stats.get(&position).cloned().unwrap_or_default();

    let mut requests: Vec<RetroRequest> = Vec::new();
    for stat in &stats.with_opponent {
        requests.push(request(config, position, stat).with_opponent(true));
    }
    for stat in &stats.without_opponent {
        requests.push(request(config, position, stat));
    }

    let mut feature_columns = Vec::new();
    for req in &requests {
        feature_columns.push(req.column_name());
        if req.with_opponent {
            feature_columns.push(req.opponent_column_name());
        }
    }

    let aggregator = RetroAggregator::new(store, weeks);
    let targets = weeks.resolve_targets(selector, config.include_current_week)?;
    let mut rows = Vec::new();

    for week in targets {
        let mut by_player: HashMap<String, Vec<f64>> = HashMap::new();
        for req in &requests {
            let column = aggregator.compute(week, req)?;
            for value in column.values {
                let slot = by_player.entry(value.player).or_default();
                slot.push(value.value);
                if req.with_opponent {
                    slot.push(value.opponent_value.unwrap_or(0.0));
                }
            }
        }

        let mut week_rows: Vec<FeatureRow> = store
            .in_week(week)
            .filter(|r| r.position == position && r.played())
            .filter_map(|r| {
                let fpts = r.stat_opt("FPTS")?;
                let features = if requests.is_empty() {
                    Vec::new()
                } else {
                    by_player.get(&r.player)?.clone()
                };
                Some(FeatureRow {
                    player: r.player.clone(),
                    team: r.team.clone(),
                    position,
                    week,
                    opponent: r.opponent.clone(),
                    fpts,
                    features,
                    fpts_class: fpts_class(fpts),
                })
            })
            .collect();
        week_rows.sort_by(|a, b| a.player.cmp(&b.player));
        rows.extend(week_rows);
    }

    info!(position = %position, rows = rows.len(), columns = feature_columns.len(), "feature table built");

    Ok(FeatureTable {
        position,
        feature_columns,
        rows,
    })
}

fn request(config: &FeaturesConfig, position: Position, stat: &str) -> RetroRequest {
    RetroRequest::new(stat, config.window, config.calc)
        .including_current(config.include_current_week)
        .for_position(position)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
