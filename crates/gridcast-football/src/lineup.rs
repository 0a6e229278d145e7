// Starting lineup selection under roster-slot rules.

use std::cmp::Ordering;

use gridcast_core::config::{LeagueConfig, LineupSlot, FLEX_SLOT};
use gridcast_core::player::Position;
use thiserror::Error;

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LineupRuleError {
    #[error("the FLEX slot must be the last lineup slot")]
    FlexNotLast,

    #[error("unknown lineup slot `{0}`")]
    UnknownSlot(String),

    #[error("lineup slot `{0}` is listed more than once")]
    DuplicateSlot(String),

    #[error("the FLEX slot has no eligible positions")]
    EmptyFlexEligibility,
}

// ---------------------------------------------------------------------------
// Rules
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotKind {
    Position(Position),
    Flex,
}

impl SlotKind {
    fn label(&self) -> &'static str {
        match self {
            SlotKind::Position(p) => p.display_str(),
            SlotKind::Flex => FLEX_SLOT,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlotRule {
    pub kind: SlotKind,
    pub count: usize,
}

impl SlotRule {
    /// Start-position tag for the `n`th (0-based) player in this slot:
    /// `RB1`, `RB2` for multi-count slots, plain `QB` otherwise.
    pub fn tag(&self, n: usize) -> String {
        if self.count > 1 {
            format!("{}{}", self.kind.label(), n + 1)
        } else {
            self.kind.label().to_string()
        }
    }
}

/// Ordered slot list. FLEX, when present, is always the final slot so it
/// only sees players the positional slots passed over.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineupRules {
    slots: Vec<SlotRule>,
    flex_positions: Vec<Position>,
}

impl LineupRules {
    pub fn new(slots: &[LineupSlot], flex_positions: &[Position]) -> Result<Self, LineupRuleError> {
        let mut rules: Vec<SlotRule> = Vec::with_capacity(slots.len());
        for slot in slots {
            let kind = if slot.slot.eq_ignore_ascii_case(FLEX_SLOT) {
                SlotKind::Flex
            } else {
                Position::from_str_pos(&slot.slot)
                    .map(SlotKind::Position)
                    .ok_or_else(|| LineupRuleError::UnknownSlot(slot.slot.clone()))?
            };
            if rules.iter().any(|r| r.kind == kind) {
                return Err(LineupRuleError::DuplicateSlot(slot.slot.clone()));
            }
            if rules.iter().any(|r| r.kind == SlotKind::Flex) {
                return Err(LineupRuleError::FlexNotLast);
            }
            rules.push(SlotRule {
                kind,
                count: slot.count,
            });
        }
        if rules.iter().any(|r| r.kind == SlotKind::Flex) && flex_positions.is_empty() {
            return Err(LineupRuleError::EmptyFlexEligibility);
        }
        Ok(LineupRules {
            slots: rules,
            flex_positions: flex_positions.to_vec(),
        })
    }

    pub fn from_league(league: &LeagueConfig) -> Result<Self, LineupRuleError> {
        LineupRules::new(&league.lineup, &league.flex_positions)
    }

    pub fn slots(&self) -> &[SlotRule] {
        &self.slots
    }

    pub fn is_flex_eligible(&self, position: Position) -> bool {
        self.flex_positions.contains(&position)
    }

    /// Every start-position tag in slot order.
    pub fn all_tags(&self) -> Vec<String> {
        self.slots
            .iter()
            .flat_map(|rule| (0..rule.count).map(move |n| rule.tag(n)))
            .collect()
    }

    pub fn starters_per_lineup(&self) -> usize {
        self.slots.iter().map(|r| r.count).sum()
    }
}

// ---------------------------------------------------------------------------
// Selection
// ---------------------------------------------------------------------------

/// One player competing for a start, ranked by `values` (primary first,
/// higher is better).
#[derive(Debug, Clone, PartialEq)]
pub struct LineupCandidate<'a> {
    pub player: &'a str,
    pub position: Position,
    pub values: Vec<f64>,
}

fn rank(a: &LineupCandidate<'_>, b: &LineupCandidate<'_>) -> Ordering {
    for (va, vb) in a.values.iter().zip(&b.values) {
        match vb.partial_cmp(va).unwrap_or(Ordering::Equal) {
            Ordering::Equal => continue,
            other => return other,
        }
    }
    a.player.cmp(b.player)
}

/// Assign start positions for one owner's players in one week.
///
/// Returns a tag per candidate (same order as the input), `None` for the
/// bench. A slot with too few eligible candidates is filled as far as
/// possible and the rest stays empty.
pub fn assign_lineups(rules: &LineupRules, candidates: &[LineupCandidate<'_>]) -> Vec<Option<String>> {
    let mut order: Vec<usize> = (0..candidates.len()).collect();
    order.sort_by(|&a, &b| rank(&candidates[a], &candidates[b]));

    let mut tags: Vec<Option<String>> = vec![None; candidates.len()];
    for rule in &rules.slots {
        let eligible = |i: &usize| -> bool {
            let pos = candidates[*i].position;
            match rule.kind {
                SlotKind::Position(p) => pos == p,
                SlotKind::Flex => rules.is_flex_eligible(pos),
            }
        };
        let picks: Vec<usize> = order
            .iter()
            .copied()
            .filter(|i| tags[*i].is_none())
            .filter(eligible)
            .take(rule.count)
            .collect();
        for (n, i) in picks.into_iter().enumerate() {
            tags[i] = Some(rule.tag(n));
        }
    }
    tags
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
