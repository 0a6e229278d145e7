// Integration tests for the gridcast pipeline.
//
// These tests load the CSV fixtures through the core ingestion layer and run
// the preparation, feature, projection, standings, rankings and leaders
// passes end-to-end through the public API.

use std::collections::BTreeMap;

use gridcast_core::aggregate::{CalcType, WindowMode};
use gridcast_core::config::*;
use gridcast_core::error::ModelError;
use gridcast_core::ingest::{load_all_from_paths, LeagueData};
use gridcast_core::player::{Participation, Position};
use gridcast_core::week::{Week, WeekSelector};
use gridcast_football::defense::{DefenseFactorEngine, CONSISTENCY_TOLERANCE};
use gridcast_football::leaders::LeadersQuery;
use gridcast_football::pipeline::{Pipeline, PipelineError};
use gridcast_football::retro::{opponent_window_value, RetroAggregator, RetroRequest};

// ===========================================================================
// Test helpers
// ===========================================================================

/// Fixture directory path (relative to the crate root, which is the cwd for
/// `cargo test`).
const FIXTURES: &str = "tests/fixtures";

fn wk(n: u8) -> Week {
    Week::new(n).unwrap()
}

fn fixture(name: &str) -> String {
    format!("{FIXTURES}/{name}")
}

fn data_paths() -> DataPaths {
    DataPaths {
        weekly_stats: fixture("weekly_stats.csv"),
        player_status: fixture("player_status.csv"),
        nfl_schedule: fixture("nfl_schedule.csv"),
        owner_schedule: fixture("owner_schedule.csv"),
        standings: fixture("standings.csv"),
        owner_corrections: None,
    }
}

/// Six-week season with four weeks played and week 6 as the playoff week.
fn inline_config() -> Config {
    let league = LeagueConfig {
        name: "Fixture League".into(),
        season: 2024,
        total_weeks: 6,
        completed_weeks: 4,
        playoff_weeks: vec![wk(6)],
        flex_positions: vec![Position::RunningBack, Position::WideReceiver],
        lineup: vec![
            LineupSlot { slot: "QB".into(), count: 1 },
            LineupSlot { slot: "RB".into(), count: 1 },
            LineupSlot { slot: "WR".into(), count: 1 },
            LineupSlot { slot: "FLEX".into(), count: 1 },
        ],
        scoring: BTreeMap::from([
            ("PAYDS".to_string(), 0.04),
            ("PATD".to_string(), 4.0),
            ("RUYDS".to_string(), 0.1),
            ("RUTD".to_string(), 6.0),
            ("REC".to_string(), 1.0),
            ("REYDS".to_string(), 0.1),
            ("INT".to_string(), -2.0),
        ]),
    };
    let features = FeaturesConfig {
        window: WindowMode::Last3,
        calc: CalcType::Avg,
        include_current_week: false,
        stats: BTreeMap::from([(
            Position::RunningBack,
            PositionFeatures {
                with_opponent: vec!["FPTS".into()],
                without_opponent: vec!["RUYDS".into()],
            },
        )]),
    };
    Config {
        league,
        projection: ProjectionConfig {
            defense_weight: 0.4,
            drop_free_agents: true,
            lineup_sort_keys: vec!["PROJ_FPTS".into()],
            fill_missing_weeks: true,
        },
        features,
        data_paths: data_paths(),
        output_dir: "output".into(),
    }
}

fn load_fixture_data() -> LeagueData {
    load_all_from_paths(&data_paths()).expect("fixtures should load")
}

// ===========================================================================
// Preparation
// ===========================================================================

#[test]
fn preparation_adds_status_and_bye_rows_and_owners() {
    let config = inline_config();
    let data = load_fixture_data();
    let pipeline = Pipeline::new(&config, &data).unwrap();
    let store = pipeline.store();

    let cook = store.get("James Cook", wk(3)).unwrap();
    assert_eq!(cook.participation, Participation::Out);
    assert!(cook.stats.is_empty());

    let mahomes = store.get("Patrick Mahomes", wk(4)).unwrap();
    assert_eq!(mahomes.participation, Participation::Bye);

    // BUF is on bye in week 4 and Allen has no status row: only the
    // projection source gets the filled row
    assert!(store.get("Josh Allen", wk(4)).is_none());
    let allen = pipeline.projection_source().get("Josh Allen", wk(4)).unwrap();
    assert_eq!(allen.participation, Participation::Bye);

    assert_eq!(
        store.get("Saquon Barkley", wk(4)).and_then(|r| r.owner.as_deref()),
        Some("AC")
    );
    assert!(pipeline.roster().is_free_agent("Tony Pollard"));
    assert!(store.rows().iter().all(|r| pipeline.weeks().is_valid(r.week)));
}

// ===========================================================================
// Retrospective features
// ===========================================================================

#[test]
fn last3_denominator_bounded_by_played_weeks() {
    let config = inline_config();
    let data = load_fixture_data();
    let pipeline = Pipeline::new(&config, &data).unwrap();
    let aggregator = RetroAggregator::new(pipeline.store(), pipeline.weeks());
    let request = RetroRequest::new("FPTS", WindowMode::Last3, CalcType::Avg);

    for &week in &pipeline.weeks().valid()[1..] {
        let window = pipeline
            .weeks()
            .retro_window(week, WindowMode::Last3, false)
            .unwrap();
        let column = aggregator.compute(week, &request).unwrap();
        for value in &column.values {
            let played = window
                .iter()
                .filter(|w| pipeline.store().get(&value.player, **w).is_some_and(|r| r.played()))
                .count();
            assert!(value.played_weeks <= 3);
            assert!(value.played_weeks <= played, "{} in {}", value.player, week);
        }
    }
}

#[test]
fn out_and_bye_weeks_in_player_averages() {
    let config = inline_config();
    let data = load_fixture_data();
    let pipeline = Pipeline::new(&config, &data).unwrap();
    let aggregator = RetroAggregator::new(pipeline.store(), pipeline.weeks());
    let request = RetroRequest::new("RUYDS", WindowMode::All, CalcType::Avg);

    // Cook: 65 and 104 in weeks 1-2, OUT in week 3, BYE in week 4
    let column = aggregator.compute(wk(4), &request).unwrap();
    assert!(column.get("James Cook").is_none(), "no row for a player on bye");

    // (65 + 104) / 2 = 84.5, rounded half to even
    let column = aggregator.compute(wk(3), &request).unwrap();
    let cook = column.get("James Cook").unwrap();
    assert_eq!(cook.value, 84.0);
    assert_eq!(cook.played_weeks, 2);

    let column = aggregator.compute(wk(4), &RetroRequest::new("RUYDS", WindowMode::Last3, CalcType::Sum))
        .unwrap();
    assert!(column.get("Isiah Pacheco").is_none());
    let barkley = column.get("Saquon Barkley").unwrap();
    // weeks 1-3: 120 + 91 + 150
    assert_eq!(barkley.value, 361.0);
}

#[test]
fn gap_fill_leaves_player_averages_and_features_alone() {
    let mut data = load_fixture_data();
    // Barkley has no row at all for week 2 (PHI played KC)
    data.store = data
        .store
        .filter(|r| !(r.player == "Saquon Barkley" && r.week == wk(2)));

    let filled_config = inline_config();
    let mut unfilled_config = inline_config();
    unfilled_config.projection.fill_missing_weeks = false;
    let filled = Pipeline::new(&filled_config, &data).unwrap();
    let unfilled = Pipeline::new(&unfilled_config, &data).unwrap();

    assert!(filled.store().get("Saquon Barkley", wk(2)).is_none());
    let gap = filled.projection_source().get("Saquon Barkley", wk(2)).unwrap();
    assert_eq!(gap.participation, Participation::Played);
    assert_eq!(gap.opponent.as_deref(), Some("KC"));
    assert!(unfilled.projection_source().get("Saquon Barkley", wk(2)).is_none());

    // weeks 1 and 3 only: (120 + 150) / 2
    let request = RetroRequest::new("RUYDS", WindowMode::All, CalcType::Avg);
    let column = RetroAggregator::new(filled.store(), filled.weeks())
        .compute(wk(4), &request)
        .unwrap();
    let barkley = column.get("Saquon Barkley").unwrap();
    assert_eq!(barkley.value, 135.0);
    assert_eq!(barkley.played_weeks, 2);

    let with_fill = filled.features(Position::RunningBack, &WeekSelector::AllWeeks).unwrap();
    let without_fill = unfilled.features(Position::RunningBack, &WeekSelector::AllWeeks).unwrap();
    assert_eq!(with_fill, without_fill);
    assert!(!with_fill
        .rows
        .iter()
        .any(|r| r.player == "Saquon Barkley" && r.week == wk(2)));

    let query = LeadersQuery::new("RUYDS");
    assert_eq!(filled.leaders(&query).unwrap(), unfilled.leaders(&query).unwrap());
}

#[test]
fn cached_opponent_aggregates_match_direct_computation() {
    let config = inline_config();
    let data = load_fixture_data();
    let pipeline = Pipeline::new(&config, &data).unwrap();
    let aggregator = RetroAggregator::new(pipeline.store(), pipeline.weeks());
    let request = RetroRequest::new("FPTS", WindowMode::All, CalcType::Avg)
        .with_opponent(true)
        .for_position(Position::RunningBack);

    for &week in &pipeline.weeks().valid()[1..] {
        let window = pipeline.weeks().retro_window(week, WindowMode::All, false).unwrap();
        let column = aggregator.compute(week, &request).unwrap();
        for value in &column.values {
            let Some(opp) = &value.opponent else { continue };
            let direct = opponent_window_value(
                pipeline.store(),
                &window,
                opp,
                Position::RunningBack,
                "FPTS",
                CalcType::Avg,
            );
            assert_eq!(value.opponent_value, Some(direct));
        }
    }
}

#[test]
fn feature_table_is_deterministic() {
    let config = inline_config();
    let data = load_fixture_data();
    let pipeline = Pipeline::new(&config, &data).unwrap();

    let first = pipeline.features(Position::RunningBack, &WeekSelector::AllWeeks).unwrap();
    let second = pipeline.features(Position::RunningBack, &WeekSelector::AllWeeks).unwrap();
    assert_eq!(first, second);

    assert_eq!(
        first.feature_columns,
        vec!["AVGL3_FPTS", "OPPAVGL3_FPTS", "AVGL3_RUYDS"]
    );
    assert!(first.rows.iter().all(|r| r.week != wk(1)));
    assert!(first.rows.iter().all(|r| r.position == Position::RunningBack));
    // Cook sat out week 3 and was on bye in week 4
    let cook_weeks: Vec<Week> = first
        .rows
        .iter()
        .filter(|r| r.player == "James Cook")
        .map(|r| r.week)
        .collect();
    assert_eq!(cook_weeks, vec![wk(2)]);
}

#[test]
fn explicit_first_week_without_current_is_rejected() {
    let config = inline_config();
    let data = load_fixture_data();
    let pipeline = Pipeline::new(&config, &data).unwrap();
    let err = pipeline
        .features(Position::RunningBack, &WeekSelector::ExplicitWeek(wk(1)))
        .unwrap_err();
    assert!(err.to_string().contains("WK1"));
}

// ===========================================================================
// Projections and standings
// ===========================================================================

#[test]
fn defense_factors_sum_to_zero() {
    let config = inline_config();
    let data = load_fixture_data();
    let pipeline = Pipeline::new(&config, &data).unwrap();
    let report = pipeline.project().unwrap();

    assert!(!report.factors.is_empty());
    for ((position, stat), sum) in report.factors.sums() {
        assert!(
            sum.abs() <= CONSISTENCY_TOLERANCE,
            "{position} {stat} factors sum to {sum}"
        );
    }
}

#[test]
fn inconsistent_defense_factors_halt_projection_and_standings() {
    let config = inline_config();
    let data = load_fixture_data();
    let strict = || DefenseFactorEngine::with_tolerance(-1.0);

    let pipeline = Pipeline::new(&config, &data).unwrap().with_defense_engine(strict());
    match pipeline.project() {
        Err(PipelineError::Model(ModelError::ConsistencyError { tolerance, .. })) => {
            assert_eq!(tolerance, -1.0);
        }
        other => panic!("expected ConsistencyError, got {other:?}"),
    }
    match pipeline.simulate() {
        Err(PipelineError::Model(ModelError::ConsistencyError { .. })) => {}
        other => panic!("expected ConsistencyError, got {other:?}"),
    }
}

#[test]
fn projections_cover_future_weeks_without_byes() {
    let config = inline_config();
    let data = load_fixture_data();
    let pipeline = Pipeline::new(&config, &data).unwrap();
    let report = pipeline.project().unwrap();

    assert!(report.run.issues.is_empty(), "{:?}", report.run.issues);
    assert!(!report.stats.contains(&"INT".to_string()));
    assert!(report
        .run
        .projections
        .iter()
        .all(|p| p.week == wk(5) || p.week == wk(6)));
    // free agents dropped
    assert!(report.run.projections.iter().all(|p| p.player != "Tony Pollard"));
    // PHI is on bye in week 6
    assert!(report
        .run
        .in_week(wk(6))
        .all(|p| p.team != "PHI" && p.team != "DAL"));
    let barkley = report
        .run
        .in_week(wk(5))
        .find(|p| p.player == "Saquon Barkley")
        .unwrap();
    assert_eq!(barkley.opponent, "DAL");
    assert!(barkley.proj_fpts > 0.0);
}

#[test]
fn standings_simulation_adds_one_regular_season_week() {
    let config = inline_config();
    let data = load_fixture_data();
    let pipeline = Pipeline::new(&config, &data).unwrap();
    let report = pipeline.simulate().unwrap();
    let sim = &report.simulation;

    // week 6 is a playoff week: one result per owner
    assert_eq!(sim.matchups.len(), 2);
    assert!(sim.matchups.iter().all(|m| m.week == wk(5)));
    let diff_sum: f64 = sim.matchups.iter().map(|m| m.diff).sum();
    assert!(diff_sum.abs() < 1e-9);

    assert_eq!(sim.standings.len(), 2);
    for row in &sim.standings {
        assert_eq!(row.games(), 5);
    }
    let ac = sim.standings.iter().find(|r| r.owner == "AC").unwrap();
    assert!(ac.points > 402.15);

    let first = &sim.standings[0];
    let second = &sim.standings[1];
    assert!(
        (first.wins, first.ties) > (second.wins, second.ties)
            || ((first.wins, first.ties) == (second.wins, second.ties) && first.points >= second.points)
    );

    // starters never exceed the four lineup slots per owner and week
    for owner in ["AC", "BD"] {
        for week in [wk(5), wk(6)] {
            let count = sim
                .starters
                .iter()
                .filter(|s| s.owner == owner && s.week == week)
                .count();
            assert!(count <= 4);
        }
    }
    // AC only has Mahomes and Pacheco available in week 6
    let ac_week6 = sim
        .starters
        .iter()
        .filter(|s| s.owner == "AC" && s.week == wk(6))
        .count();
    assert_eq!(ac_week6, 2);
}

// ===========================================================================
// Rankings and leaders
// ===========================================================================

#[test]
fn power_rankings_cover_every_owner() {
    let config = inline_config();
    let data = load_fixture_data();
    let pipeline = Pipeline::new(&config, &data).unwrap();
    let rankings = pipeline.rankings().unwrap();

    let owners: Vec<&str> = rankings.iter().map(|r| r.owner.as_str()).collect();
    assert_eq!(owners.len(), 2);
    assert!(owners.contains(&"AC") && owners.contains(&"BD"));
    assert!(rankings[0].total_class >= rankings[1].total_class);
    for ranking in &rankings {
        assert!(ranking.slots.len() <= 4);
    }
}

#[test]
fn receiving_leaders() {
    let config = inline_config();
    let data = load_fixture_data();
    let pipeline = Pipeline::new(&config, &data).unwrap();

    let mut query = LeadersQuery::new("REYDS");
    query.tiebreak = Some("REC".into());
    query.positions = vec![Position::WideReceiver];
    query.limit = 5;
    let rows = pipeline.leaders(&query).unwrap();

    assert_eq!(rows.len(), 2);
    // Lamb 380 yards, Brown 370
    assert_eq!(rows[0].player, "CeeDee Lamb");
    assert_eq!(rows[0].total, 380.0);
    assert_eq!(rows[1].player, "A.J. Brown");
    assert_eq!(rows[1].tiebreak_total, Some(25.0));
}
