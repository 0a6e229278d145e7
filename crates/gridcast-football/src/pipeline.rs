// Pipeline orchestration: prepares the record store once, then runs the
// feature, projection, standings, rankings and leaders passes over it.

use gridcast_core::config::Config;
use gridcast_core::error::ModelError;
use gridcast_core::ingest::LeagueData;
use gridcast_core::player::{PlayerRecordStore, Position};
use gridcast_core::roster::{RosterMap, TeamPositionMap};
use gridcast_core::week::{WeekIndex, WeekSelector};
use thiserror::Error;
use tracing::info;

use crate::defense::{opponent_blended_averages, DefenseFactorEngine, DefenseFactors};
use crate::features::{build_feature_table, FeatureTable};
use crate::leaders::{statistic_leaders, LeaderRow, LeadersQuery};
use crate::lineup::{LineupRuleError, LineupRules};
use crate::projection::{
    blend_player_baselines, drop_free_agents, prepare_projection_data, ProjectionEngine, ProjectionRun,
};
use crate::rankings::{power_rankings, PowerRanking};
use crate::standings::{SimulationOutcome, StandingsSimulator};

/// Weeks making up the recent-form window.
const RECENT_WEEKS: usize = 3;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Model(#[from] ModelError),

    #[error("invalid lineup rules: {0}")]
    Lineup(#[from] LineupRuleError),
}

/// Projections together with the defense factors behind them.
#[derive(Debug, Clone)]
pub struct ProjectionReport {
    pub run: ProjectionRun,
    pub factors: DefenseFactors,
    pub stats: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct StandingsReport {
    pub projections: ProjectionReport,
    pub simulation: SimulationOutcome,
}

pub struct Pipeline<'a> {
    config: &'a Config,
    data: &'a LeagueData,
    weeks: WeekIndex,
    store: PlayerRecordStore,
    projection_source: PlayerRecordStore,
    teams: TeamPositionMap,
    roster: RosterMap,
    defense: DefenseFactorEngine,
}

impl<'a> Pipeline<'a> {
    /// Restrict the raw observations to completed weeks, add did-not-play
    /// rows and stamp every row with its owner. Missing weeks are filled
    /// only in the copy the projection pass reads; features, rankings and
    /// leaders see the observed rows.
    pub fn new(config: &'a Config, data: &'a LeagueData) -> Result<Self, PipelineError> {
        let weeks = config.week_index()?;
        let valid = weeks.valid().to_vec();

        let store = data
            .store
            .with_status_rows(&data.statuses)
            .filter(|r| valid.contains(&r.week));
        let teams = TeamPositionMap::from_store(&store, &valid);
        let roster = RosterMap::from_store(&store, &valid, &data.corrections);
        let store = store.with_owners(&roster);
        let projection_source = if config.projection.fill_missing_weeks {
            store
                .fill_missing_weeks(&teams, &data.nfl_schedule)
                .with_owners(&roster)
        } else {
            store.clone()
        };

        info!(
            rows = store.len(),
            projection_rows = projection_source.len(),
            players = teams.len(),
            rostered = roster.len(),
            completed_weeks = valid.len(),
            "record store prepared"
        );

        Ok(Pipeline {
            config,
            data,
            weeks,
            store,
            projection_source,
            teams,
            roster,
            defense: DefenseFactorEngine::default(),
        })
    }

    /// Replace the engine that turns opponent aggregates into defense factors.
    pub fn with_defense_engine(mut self, engine: DefenseFactorEngine) -> Self {
        self.defense = engine;
        self
    }

    pub fn weeks(&self) -> &WeekIndex {
        &self.weeks
    }

    pub fn store(&self) -> &PlayerRecordStore {
        &self.store
    }

    /// Store the projection pass prepares from, with gap weeks filled when
    /// configured.
    pub fn projection_source(&self) -> &PlayerRecordStore {
        &self.projection_source
    }

    pub fn roster(&self) -> &RosterMap {
        &self.roster
    }

    pub fn features(&self, position: Position, selector: &WeekSelector) -> Result<FeatureTable, PipelineError> {
        Ok(build_feature_table(
            &self.store,
            &self.weeks,
            position,
            &self.config.features,
            selector,
        )?)
    }

    /// Baselines, opponent aggregates, defense factors, then projections for
    /// every future week. A consistency failure aborts the run.
    pub fn project(&self) -> Result<ProjectionReport, PipelineError> {
        let prepared = prepare_projection_data(&self.projection_source, &self.data.nfl_schedule);
        let engine = ProjectionEngine::for_scoring(
            &prepared,
            self.config.league.scoring.clone(),
            self.config.projection.defense_weight,
        );
        let stats = engine.stats().to_vec();
        let all = self.weeks.valid();
        let recent = self.weeks.recent(RECENT_WEEKS);

        let mut baselines = blend_player_baselines(&prepared, all, recent, &stats)?;
        if self.config.projection.drop_free_agents {
            baselines = drop_free_agents(baselines);
        }

        let aggregates = opponent_blended_averages(&prepared, all, recent, &stats)?;
        let factors = self.defense.compute(&aggregates)?;

        let run = engine.project(
            &baselines,
            &self.teams,
            &self.data.nfl_schedule,
            self.weeks.future(),
            &factors,
        );
        Ok(ProjectionReport { run, factors, stats })
    }

    pub fn simulate(&self) -> Result<StandingsReport, PipelineError> {
        let projections = self.project()?;
        let rules = LineupRules::from_league(&self.config.league)?;
        let simulator = StandingsSimulator::new(
            rules,
            self.config.projection.lineup_sort_keys.clone(),
            self.config.league.playoff_weeks.clone(),
        );
        let simulation = simulator.simulate(
            &projections.run.projections,
            self.weeks.future(),
            &self.data.owner_schedule,
            &self.data.standings,
        )?;
        Ok(StandingsReport {
            projections,
            simulation,
        })
    }

    pub fn rankings(&self) -> Result<Vec<PowerRanking>, PipelineError> {
        let rules = LineupRules::from_league(&self.config.league)?;
        Ok(power_rankings(&self.store, self.weeks.valid(), &rules))
    }

    pub fn leaders(&self, query: &LeadersQuery) -> Result<Vec<LeaderRow>, PipelineError> {
        Ok(statistic_leaders(&self.store, &self.weeks, query)?)
    }
}
