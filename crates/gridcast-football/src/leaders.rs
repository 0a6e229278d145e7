// Season statistic leaders with optional slicing.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use gridcast_core::error::ModelError;
use gridcast_core::player::{PlayerRecordStore, Position};
use gridcast_core::week::{Week, WeekIndex};
use tracing::debug;

/// Largest number of rows a leaders query returns.
pub const MAX_LEADERS: usize = 25;

/// Empty filter lists mean "no filter"; an empty week list means every
/// valid week.
#[derive(Debug, Clone, PartialEq)]
pub struct LeadersQuery {
    pub stat: String,
    pub tiebreak: Option<String>,
    pub positions: Vec<Position>,
    pub teams: Vec<String>,
    pub opponents: Vec<String>,
    pub weeks: Vec<Week>,
    pub limit: usize,
}

impl LeadersQuery {
    pub fn new(stat: impl Into<String>) -> Self {
        LeadersQuery {
            stat: stat.into(),
            tiebreak: None,
            positions: Vec::new(),
            teams: Vec::new(),
            opponents: Vec::new(),
            weeks: Vec::new(),
            limit: 10,
        }
    }

    fn stats(&self) -> Vec<&str> {
        std::iter::once(self.stat.as_str())
            .chain(self.tiebreak.as_deref())
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LeaderRow {
    pub player: String,
    pub position: Position,
    pub total: f64,
    pub tiebreak_total: Option<f64>,
}

pub fn statistic_leaders(
    store: &PlayerRecordStore,
    weeks: &WeekIndex,
    query: &LeadersQuery,
) -> Result<Vec<LeaderRow>, ModelError> {
    let stats = query.stats();
    for stat in &stats {
        store.require_stat(stat)?;
    }
    for &week in &query.weeks {
        weeks.require_valid(week)?;
    }
    let window: &[Week] = if query.weeks.is_empty() {
        weeks.valid()
    } else {
        &query.weeks
    };

    let mut totals: BTreeMap<(String, Position), Vec<f64>> = BTreeMap::new();
    for row in store.in_weeks(window) {
        if !query.positions.is_empty() && !query.positions.contains(&row.position) {
            continue;
        }
        if !query.teams.is_empty() && !query.teams.iter().any(|t| t.eq_ignore_ascii_case(&row.team)) {
            continue;
        }
        if !query.opponents.is_empty() {
            let faced = row
                .opponent
                .as_deref()
                .is_some_and(|opp| query.opponents.iter().any(|o| o.eq_ignore_ascii_case(opp)));
            if !faced {
                continue;
            }
        }
        let Some(values) = stats.iter().map(|s| row.stat_opt(s)).collect::<Option<Vec<f64>>>() else {
            continue;
        };
        let sums = totals
            .entry((row.player.clone(), row.position))
            .or_insert_with(|| vec![0.0; stats.len()]);
        for (sum, v) in sums.iter_mut().zip(values) {
            *sum += v;
        }
    }

    let mut rows: Vec<LeaderRow> = totals
        .into_iter()
        .map(|((player, position), sums)| LeaderRow {
            player,
            position,
            total: sums[0],
            tiebreak_total: sums.get(1).copied(),
        })
        .collect();
    rows.sort_by(|a, b| {
        b.total
            .partial_cmp(&a.total)
            .unwrap_or(Ordering::Equal)
            .then_with(|| {
                b.tiebreak_total
                    .partial_cmp(&a.tiebreak_total)
                    .unwrap_or(Ordering::Equal)
            })
            .then_with(|| a.player.cmp(&b.player))
    });
    rows.truncate(query.limit.min(MAX_LEADERS));
    debug!(stat = %query.stat, rows = rows.len(), "leaders computed");
    Ok(rows)
}
