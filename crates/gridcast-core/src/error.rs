// Error taxonomy shared by the aggregation, projection and standings engines.

use thiserror::Error;

use crate::player::Position;
use crate::week::Week;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ModelError {
    /// The requested statistic is not a column of the reference data.
    #[error("statistic `{stat}` is not a column in the reference data")]
    InvalidStatistic { stat: String },

    /// Malformed week token, or a week outside the range the call allows.
    #[error("invalid week reference `{week}`: {reason}")]
    InvalidWeekReference { week: String, reason: String },

    /// Defense factors for one (position, stat) pair do not sum to zero.
    #[error("defense factors for {position} {stat} sum to {sum:.3e}, outside tolerance {tolerance:e}")]
    ConsistencyError {
        position: Position,
        stat: String,
        sum: f64,
        tolerance: f64,
    },

    #[error("cannot resolve the current team of player `{player}`")]
    UnresolvedPlayer { player: String },

    #[error("no schedule entry for {team} in {week} (player `{player}`)")]
    UnresolvedSchedule {
        player: String,
        team: String,
        week: Week,
    },

    #[error("schedule integrity violated for owner `{owner}` in {week}: {message}")]
    ScheduleIntegrityError {
        owner: String,
        week: Week,
        message: String,
    },
}

impl ModelError {
    /// Whether this error only invalidates a single row of a batch.
    pub fn is_row_level(&self) -> bool {
        matches!(
            self,
            ModelError::UnresolvedPlayer { .. } | ModelError::UnresolvedSchedule { .. }
        )
    }
}
