// Week tokens and the ordered catalogue of completed and future weeks.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::aggregate::WindowMode;
use crate::error::ModelError;

// ---------------------------------------------------------------------------
// Week token
// ---------------------------------------------------------------------------

/// A single scoring period, displayed as `WK<n>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Week(u8);

impl Week {
    /// Week numbers start at 1.
    pub fn new(number: u8) -> Option<Self> {
        (number > 0).then_some(Week(number))
    }

    pub fn number(self) -> u8 {
        self.0
    }
}

impl fmt::Display for Week {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "WK{}", self.0)
    }
}

impl FromStr for Week {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let token = s.trim();
        let invalid = || ModelError::InvalidWeekReference {
            week: token.to_string(),
            reason: "expected a token like WK1".into(),
        };
        let digits = match token.get(..2) {
            Some(prefix) if prefix.eq_ignore_ascii_case("WK") => &token[2..],
            _ => return Err(invalid()),
        };
        let number: u8 = digits.parse().map_err(|_| invalid())?;
        Week::new(number).ok_or_else(invalid)
    }
}

impl TryFrom<String> for Week {
    type Error = ModelError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Week> for String {
    fn from(week: Week) -> Self {
        week.to_string()
    }
}

// ---------------------------------------------------------------------------
// Target week selection
// ---------------------------------------------------------------------------

/// Which weeks a retrospective pass produces rows for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WeekSelector {
    /// Every completed week (minus the first when the current week is excluded).
    AllWeeks,
    ExplicitWeek(Week),
    ExplicitWeeks(Vec<Week>),
}

// ---------------------------------------------------------------------------
// Week catalogue
// ---------------------------------------------------------------------------

/// Ordered catalogue of a season's weeks. The completed ("valid") weeks are
/// always a prefix of the full list; the remainder are projection targets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WeekIndex {
    all: Vec<Week>,
    completed: usize,
}

impl WeekIndex {
    pub fn new(total_weeks: u8, completed_weeks: u8) -> Result<Self, ModelError> {
        if total_weeks == 0 {
            return Err(ModelError::InvalidWeekReference {
                week: "WK0".into(),
                reason: "a season needs at least one week".into(),
            });
        }
        if completed_weeks > total_weeks {
            return Err(ModelError::InvalidWeekReference {
                week: format!("WK{completed_weeks}"),
                reason: format!("completed weeks exceed the {total_weeks}-week season"),
            });
        }
        Ok(Self {
            all: (1..=total_weeks).map(Week).collect(),
            completed: completed_weeks as usize,
        })
    }

    pub fn all(&self) -> &[Week] {
        &self.all
    }

    /// Weeks with completed data.
    pub fn valid(&self) -> &[Week] {
        &self.all[..self.completed]
    }

    /// Weeks still to be played.
    pub fn future(&self) -> &[Week] {
        &self.all[self.completed..]
    }

    /// The last `n` valid weeks (fewer if the season is younger).
    pub fn recent(&self, n: usize) -> &[Week] {
        let valid = self.valid();
        &valid[valid.len().saturating_sub(n)..]
    }

    pub fn contains(&self, week: Week) -> bool {
        self.all.contains(&week)
    }

    pub fn is_valid(&self, week: Week) -> bool {
        self.valid().contains(&week)
    }

    pub fn require_valid(&self, week: Week) -> Result<(), ModelError> {
        if self.is_valid(week) {
            Ok(())
        } else {
            Err(ModelError::InvalidWeekReference {
                week: week.to_string(),
                reason: "week has no completed data".into(),
            })
        }
    }

    /// Trailing window for `target`: every valid week strictly before it,
    /// plus `target` itself when `include_current` is set, cut to the last
    /// three for [`WindowMode::Last3`]. The first week without inclusion
    /// yields an empty window.
    pub fn retro_window(
        &self,
        target: Week,
        mode: WindowMode,
        include_current: bool,
    ) -> Result<Vec<Week>, ModelError> {
        self.require_valid(target)?;
        let mut window: Vec<Week> = self
            .valid()
            .iter()
            .copied()
            .take_while(|w| *w < target)
            .collect();
        if include_current {
            window.push(target);
        }
        if mode == WindowMode::Last3 && window.len() > 3 {
            window.drain(..window.len() - 3);
        }
        Ok(window)
    }

    /// Resolve a selector into concrete target weeks.
    ///
    /// Excluding the current week makes the first week meaningless as a
    /// target: `AllWeeks` drops it and an explicit request for it is an
    /// `InvalidWeekReference`.
    pub fn resolve_targets(
        &self,
        selector: &WeekSelector,
        include_current: bool,
    ) -> Result<Vec<Week>, ModelError> {
        let explicit = |weeks: &[Week]| -> Result<Vec<Week>, ModelError> {
            let first = self.valid().first().copied();
            for &week in weeks {
                self.require_valid(week)?;
                if !include_current && Some(week) == first {
                    return Err(ModelError::InvalidWeekReference {
                        week: week.to_string(),
                        reason: "the first week has no prior data; include the current week to target it"
                            .into(),
                    });
                }
            }
            Ok(weeks.to_vec())
        };

        match selector {
            WeekSelector::AllWeeks => {
                let skip = usize::from(!include_current);
                Ok(self.valid().iter().skip(skip).copied().collect())
            }
            WeekSelector::ExplicitWeek(week) => explicit(std::slice::from_ref(week)),
            WeekSelector::ExplicitWeeks(weeks) => explicit(weeks),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
