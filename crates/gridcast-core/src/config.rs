// Configuration loading and parsing (league.toml, model.toml).

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, info};

use crate::aggregate::{CalcType, WindowMode};
use crate::error::ModelError;
use crate::player::Position;
use crate::week::{Week, WeekIndex};

const DEFAULTS_DIR: &str = "defaults";
const CONFIG_DIR: &str = "config";
const LEAGUE_FILE: &str = "league.toml";
const MODEL_FILE: &str = "model.toml";

/// Label of the lineup slot any flex-eligible position may fill.
pub const FLEX_SLOT: &str = "FLEX";

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config file not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error("failed to parse config file {path}: {source}")]
    ParseError {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("validation error for field `{field}`: {message}")]
    ValidationError { field: String, message: String },

    #[error("failed to initialize config from defaults: {message}")]
    DefaultsCopyError { message: String },
}

// ---------------------------------------------------------------------------
// Top-level assembled Config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct Config {
    pub league: LeagueConfig,
    pub projection: ProjectionConfig,
    pub features: FeaturesConfig,
    pub data_paths: DataPaths,
    pub output_dir: String,
}

impl Config {
    /// Week catalogue for the configured season.
    pub fn week_index(&self) -> Result<WeekIndex, ModelError> {
        WeekIndex::new(self.league.total_weeks, self.league.completed_weeks)
    }
}

// ---------------------------------------------------------------------------
// league.toml structs
// ---------------------------------------------------------------------------

/// Wrapper for the top-level `[league]` table in league.toml.
#[derive(Debug, Clone, Deserialize)]
struct LeagueFile {
    league: RawLeague,
}

#[derive(Debug, Clone, Deserialize)]
struct RawLeague {
    name: String,
    season: u16,
    total_weeks: u8,
    completed_weeks: u8,
    #[serde(default)]
    playoff_weeks: Vec<String>,
    #[serde(default)]
    flex_positions: Vec<Position>,
    lineup: Vec<LineupSlot>,
    scoring: BTreeMap<String, f64>,
}

#[derive(Debug, Clone)]
pub struct LeagueConfig {
    pub name: String,
    pub season: u16,
    pub total_weeks: u8,
    /// Length of the completed-week prefix.
    pub completed_weeks: u8,
    /// Weeks left out of simulated matchups.
    pub playoff_weeks: Vec<Week>,
    pub flex_positions: Vec<Position>,
    /// Ordered starting slots. FLEX, if present, comes last.
    pub lineup: Vec<LineupSlot>,
    /// Fantasy points per unit of each statistic.
    pub scoring: BTreeMap<String, f64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LineupSlot {
    pub slot: String,
    pub count: usize,
}

// ---------------------------------------------------------------------------
// model.toml structs
// ---------------------------------------------------------------------------

/// Raw deserialization target for the entire model.toml file.
#[derive(Debug, Clone, Deserialize)]
struct ModelFile {
    projection: ProjectionConfig,
    features: FeaturesConfig,
    data_paths: DataPaths,
    output: OutputSection,
}

#[derive(Debug, Clone, Deserialize)]
struct OutputSection {
    dir: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProjectionConfig {
    /// How strongly opponent strength perturbs a naive projection, in [0, 1].
    pub defense_weight: f64,
    #[serde(default = "default_true")]
    pub drop_free_agents: bool,
    /// Value columns ranking lineup candidates, primary first.
    pub lineup_sort_keys: Vec<String>,
    #[serde(default = "default_true")]
    pub fill_missing_weeks: bool,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Deserialize)]
pub struct FeaturesConfig {
    pub window: WindowMode,
    pub calc: CalcType,
    #[serde(default)]
    pub include_current_week: bool,
    #[serde(default)]
    pub stats: BTreeMap<Position, PositionFeatures>,
}

/// Statistics turned into retrospective features for one position.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct PositionFeatures {
    /// Stats that also get an opponent-position aggregate column.
    #[serde(default)]
    pub with_opponent: Vec<String>,
    #[serde(default)]
    pub without_opponent: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DataPaths {
    pub weekly_stats: String,
    pub player_status: String,
    pub nfl_schedule: String,
    pub owner_schedule: String,
    pub standings: String,
    #[serde(default)]
    pub owner_corrections: Option<String>,
}

// ---------------------------------------------------------------------------
// Loading logic
// ---------------------------------------------------------------------------

/// Read and validate `config/league.toml` and `config/model.toml` under
/// `base_dir`. Missing files are an error here; `load_config` seeds them.
pub fn load_config_from(base_dir: &Path) -> Result<Config, ConfigError> {
    let config_dir = base_dir.join(CONFIG_DIR);
    let league: LeagueFile = read_toml(&config_dir.join(LEAGUE_FILE))?;
    let model: ModelFile = read_toml(&config_dir.join(MODEL_FILE))?;

    let config = Config {
        league: assemble_league(league.league)?,
        projection: model.projection,
        features: model.features,
        data_paths: model.data_paths,
        output_dir: model.output.dir,
    };
    validate(&config)?;
    debug!(
        league = %config.league.name,
        season = config.league.season,
        "configuration loaded from {}",
        config_dir.display()
    );
    Ok(config)
}

fn assemble_league(raw: RawLeague) -> Result<LeagueConfig, ConfigError> {
    let playoff_weeks = raw
        .playoff_weeks
        .iter()
        .map(|token| {
            token
                .parse::<Week>()
                .map_err(|e| ConfigError::ValidationError {
                    field: "league.playoff_weeks".into(),
                    message: e.to_string(),
                })
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(LeagueConfig {
        name: raw.name,
        season: raw.season,
        total_weeks: raw.total_weeks,
        completed_weeks: raw.completed_weeks,
        playoff_weeks,
        flex_positions: raw.flex_positions,
        lineup: raw.lineup,
        scoring: raw.scoring,
    })
}

/// Seed `config/` with any league or model file it lacks, copied from the
/// shipped `defaults/`. Files ending in `.example` stay behind. Returns the
/// paths written; existing files are never touched.
pub fn ensure_config_files(base_dir: &Path) -> Result<Vec<PathBuf>, ConfigError> {
    let defaults_dir = base_dir.join(DEFAULTS_DIR);
    let config_dir = base_dir.join(CONFIG_DIR);

    if !defaults_dir.is_dir() {
        if config_dir.is_dir() {
            return Ok(Vec::new());
        }
        return Err(defaults_error(format!(
            "no defaults/ or config/ directory under {}; run gridcast from the repository root",
            base_dir.display()
        )));
    }

    fs::create_dir_all(&config_dir)
        .map_err(|e| defaults_error(format!("cannot create {}: {e}", config_dir.display())))?;
    let entries = fs::read_dir(&defaults_dir)
        .map_err(|e| defaults_error(format!("cannot list {}: {e}", defaults_dir.display())))?;

    let mut copied = Vec::new();
    for entry in entries {
        let source = entry
            .map_err(|e| defaults_error(format!("cannot list {}: {e}", defaults_dir.display())))?
            .path();
        let Some(name) = source.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        if !source.is_file() || name.ends_with(".example") {
            continue;
        }
        let target = config_dir.join(name);
        if seed_file(&source, &target)? {
            info!("copied default {} into {}", name, config_dir.display());
            copied.push(target);
        }
    }
    Ok(copied)
}

/// Copy `source` to `target` unless `target` already exists. Returns whether
/// a file was written.
fn seed_file(source: &Path, target: &Path) -> Result<bool, ConfigError> {
    let mut dest = match fs::OpenOptions::new().write(true).create_new(true).open(target) {
        Ok(file) => file,
        Err(e) if e.kind() == io::ErrorKind::AlreadyExists => return Ok(false),
        Err(e) => return Err(defaults_error(format!("cannot create {}: {e}", target.display()))),
    };
    let mut src = fs::File::open(source)
        .map_err(|e| defaults_error(format!("cannot read {}: {e}", source.display())))?;
    io::copy(&mut src, &mut dest)
        .map_err(|e| defaults_error(format!("cannot write {}: {e}", target.display())))?;
    Ok(true)
}

fn defaults_error(message: String) -> ConfigError {
    ConfigError::DefaultsCopyError { message }
}

/// Load `config/league.toml` and `config/model.toml` from the current
/// directory, seeding them from `defaults/` first.
pub fn load_config() -> Result<Config, ConfigError> {
    let cwd = std::env::current_dir().map_err(|_| ConfigError::FileNotFound {
        path: PathBuf::from("."),
    })?;
    ensure_config_files(&cwd)?;
    load_config_from(&cwd)
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn read_toml<T: DeserializeOwned>(path: &Path) -> Result<T, ConfigError> {
    let text = fs::read_to_string(path).map_err(|_| ConfigError::FileNotFound {
        path: path.to_path_buf(),
    })?;
    toml::from_str(&text).map_err(|source| ConfigError::ParseError {
        path: path.to_path_buf(),
        source,
    })
}

fn invalid(field: &str, message: impl Into<String>) -> ConfigError {
    ConfigError::ValidationError {
        field: field.into(),
        message: message.into(),
    }
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

fn validate(config: &Config) -> Result<(), ConfigError> {
    let league = &config.league;

    if league.total_weeks == 0 {
        return Err(invalid("league.total_weeks", "must be greater than 0"));
    }
    if league.completed_weeks > league.total_weeks {
        return Err(invalid(
            "league.completed_weeks",
            format!(
                "must not exceed total_weeks ({}), got {}",
                league.total_weeks, league.completed_weeks
            ),
        ));
    }
    for week in &league.playoff_weeks {
        if week.number() > league.total_weeks {
            return Err(invalid(
                "league.playoff_weeks",
                format!("{week} is outside the {}-week season", league.total_weeks),
            ));
        }
    }

    // Lineup: non-empty, positive counts, known unique slots, FLEX last.
    if league.lineup.is_empty() {
        return Err(invalid("league.lineup", "must list at least one slot"));
    }
    let last = league.lineup.len() - 1;
    for (i, slot) in league.lineup.iter().enumerate() {
        if slot.count == 0 {
            return Err(invalid(
                "league.lineup",
                format!("slot {} must have a count > 0", slot.slot),
            ));
        }
        let is_flex = slot.slot.eq_ignore_ascii_case(FLEX_SLOT);
        if !is_flex && Position::from_str_pos(&slot.slot).is_none() {
            return Err(invalid(
                "league.lineup",
                format!("unknown slot `{}`", slot.slot),
            ));
        }
        if is_flex && i != last {
            return Err(invalid("league.lineup", "FLEX must be the last slot"));
        }
        if is_flex && league.flex_positions.is_empty() {
            return Err(invalid(
                "league.flex_positions",
                "a FLEX slot needs at least one eligible position",
            ));
        }
        if league.lineup[..i]
            .iter()
            .any(|s| s.slot.eq_ignore_ascii_case(&slot.slot))
        {
            return Err(invalid(
                "league.lineup",
                format!("slot {} is listed twice", slot.slot),
            ));
        }
    }

    if league.scoring.is_empty() {
        return Err(invalid("league.scoring", "must list at least one statistic"));
    }
    for (stat, weight) in &league.scoring {
        if !weight.is_finite() {
            return Err(invalid(
                &format!("league.scoring.{stat}"),
                format!("must be finite, got {weight}"),
            ));
        }
    }

    let weight = config.projection.defense_weight;
    if !(0.0..=1.0).contains(&weight) {
        return Err(invalid(
            "projection.defense_weight",
            format!("must be between 0.0 and 1.0 inclusive, got {weight}"),
        ));
    }
    if config.projection.lineup_sort_keys.is_empty() {
        return Err(invalid(
            "projection.lineup_sort_keys",
            "must list at least one value column",
        ));
    }

    if config.output_dir.trim().is_empty() {
        return Err(invalid("output.dir", "must not be empty"));
    }

    Ok(())
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    /// Repository root, where `defaults/` lives.
    fn project_root() -> PathBuf {
        Path::new(env!("CARGO_MANIFEST_DIR")).join("../..")
    }

    /// Fresh temp dir with `config/` holding the default model.toml.
    fn scratch_with_model(name: &str) -> PathBuf {
        let tmp = std::env::temp_dir().join(name);
        let _ = fs::remove_dir_all(&tmp);
        fs::create_dir_all(tmp.join("config")).unwrap();
        fs::copy(
            project_root().join("defaults/model.toml"),
            tmp.join("config/model.toml"),
        )
        .unwrap();
        tmp
    }

    fn league_toml(extra_lineup: &str, completed: u8) -> String {
        format!(
            r#"
[league]
name = "Test"
season = 2024
total_weeks = 17
completed_weeks = {completed}
playoff_weeks = ["WK15", "WK16", "WK17"]
flex_positions = ["RB", "WR", "TE"]

[[league.lineup]]
slot = "QB"
count = 1
{extra_lineup}

[league.scoring]
FPTS = 1.0
"#
        )
    }

    fn expect_field(err: ConfigError, expected: &str) {
        match err {
            ConfigError::ValidationError { field, .. } => assert_eq!(field, expected),
            other => panic!("expected ValidationError, got: {other}"),
        }
    }

    #[test]
    fn load_valid_config_from_project_files() {
        let tmp = std::env::temp_dir().join("gridcast_config_defaults");
        let _ = fs::remove_dir_all(&tmp);
        fs::create_dir_all(tmp.join("config")).unwrap();
        for name in ["league.toml", "model.toml"] {
            fs::copy(project_root().join("defaults").join(name), tmp.join("config").join(name))
                .unwrap();
        }

        let config = load_config_from(&tmp).expect("should load valid config");

        assert_eq!(config.league.total_weeks, 17);
        assert_eq!(config.league.playoff_weeks.len(), 3);
        assert_eq!(
            config.league.flex_positions,
            vec![Position::RunningBack, Position::WideReceiver, Position::TightEnd]
        );
        assert_eq!(config.league.lineup.last().map(|s| s.slot.as_str()), Some("FLEX"));
        assert!((config.league.scoring["PAYDS"] - 0.04).abs() < f64::EPSILON);
        assert!((config.league.scoring["INT"] + 2.0).abs() < f64::EPSILON);
        assert!((config.projection.defense_weight - 0.4).abs() < f64::EPSILON);
        assert_eq!(config.features.window, WindowMode::Last3);
        assert_eq!(config.features.calc, CalcType::Avg);
        assert!(!config.features.include_current_week);
        let rb = &config.features.stats[&Position::RunningBack];
        assert!(rb.with_opponent.contains(&"RUYDS".to_string()));
        assert!(rb.without_opponent.contains(&"SNAP %".to_string()));
        assert_eq!(config.data_paths.weekly_stats, "data/weekly_stats.csv");

        let index = config.week_index().unwrap();
        assert_eq!(index.valid().len(), config.league.completed_weeks as usize);

        let _ = fs::remove_dir_all(&tmp);
    }

    #[test]
    fn rejects_completed_beyond_total() {
        let tmp = scratch_with_model("gridcast_config_completed");
        fs::write(tmp.join("config/league.toml"), league_toml("", 18)).unwrap();
        expect_field(load_config_from(&tmp).unwrap_err(), "league.completed_weeks");
        let _ = fs::remove_dir_all(&tmp);
    }

    #[test]
    fn rejects_flex_not_last() {
        let tmp = scratch_with_model("gridcast_config_flex_order");
        let lineup = "[[league.lineup]]\nslot = \"FLEX\"\ncount = 1\n\n[[league.lineup]]\nslot = \"RB\"\ncount = 2\n";
        fs::write(tmp.join("config/league.toml"), league_toml(lineup, 8)).unwrap();
        expect_field(load_config_from(&tmp).unwrap_err(), "league.lineup");
        let _ = fs::remove_dir_all(&tmp);
    }

    #[test]
    fn rejects_unknown_slot() {
        let tmp = scratch_with_model("gridcast_config_unknown_slot");
        let lineup = "[[league.lineup]]\nslot = \"LB\"\ncount = 1\n";
        fs::write(tmp.join("config/league.toml"), league_toml(lineup, 8)).unwrap();
        expect_field(load_config_from(&tmp).unwrap_err(), "league.lineup");
        let _ = fs::remove_dir_all(&tmp);
    }

    #[test]
    fn rejects_malformed_playoff_week() {
        let tmp = scratch_with_model("gridcast_config_playoff");
        let text = league_toml("", 8).replace("\"WK15\"", "\"Week15\"");
        fs::write(tmp.join("config/league.toml"), text).unwrap();
        expect_field(load_config_from(&tmp).unwrap_err(), "league.playoff_weeks");
        let _ = fs::remove_dir_all(&tmp);
    }

    #[test]
    fn rejects_defense_weight_out_of_range() {
        let tmp = scratch_with_model("gridcast_config_defense_weight");
        fs::write(tmp.join("config/league.toml"), league_toml("", 8)).unwrap();
        let model = fs::read_to_string(tmp.join("config/model.toml"))
            .unwrap()
            .replace("defense_weight = 0.4", "defense_weight = 1.5");
        fs::write(tmp.join("config/model.toml"), model).unwrap();
        expect_field(load_config_from(&tmp).unwrap_err(), "projection.defense_weight");
        let _ = fs::remove_dir_all(&tmp);
    }

    #[test]
    fn file_not_found_for_missing_league_toml() {
        let tmp = scratch_with_model("gridcast_config_missing_league");
        match load_config_from(&tmp).unwrap_err() {
            ConfigError::FileNotFound { path } => assert!(path.ends_with("league.toml")),
            other => panic!("expected FileNotFound, got: {other}"),
        }
        let _ = fs::remove_dir_all(&tmp);
    }

    #[test]
    fn parse_error_for_invalid_toml() {
        let tmp = scratch_with_model("gridcast_config_invalid_toml");
        fs::write(tmp.join("config/league.toml"), "[league\nname = ").unwrap();
        assert!(matches!(
            load_config_from(&tmp).unwrap_err(),
            ConfigError::ParseError { .. }
        ));
        let _ = fs::remove_dir_all(&tmp);
    }

    #[test]
    fn ensure_config_files_copies_missing_files() {
        let tmp = std::env::temp_dir().join("gridcast_config_ensure_copies");
        let _ = fs::remove_dir_all(&tmp);
        fs::create_dir_all(tmp.join("defaults")).unwrap();
        fs::write(tmp.join("defaults/league.toml"), "a").unwrap();
        fs::write(tmp.join("defaults/model.toml"), "b").unwrap();
        fs::write(tmp.join("defaults/secret.toml.example"), "c").unwrap();

        let copied = ensure_config_files(&tmp).unwrap();
        assert_eq!(copied.len(), 2);
        assert!(tmp.join("config/league.toml").exists());
        assert!(!tmp.join("config/secret.toml.example").exists());

        let _ = fs::remove_dir_all(&tmp);
    }

    #[test]
    fn ensure_config_files_skips_existing() {
        let tmp = std::env::temp_dir().join("gridcast_config_ensure_skips");
        let _ = fs::remove_dir_all(&tmp);
        fs::create_dir_all(tmp.join("defaults")).unwrap();
        fs::create_dir_all(tmp.join("config")).unwrap();
        fs::write(tmp.join("defaults/league.toml"), "default").unwrap();
        fs::write(tmp.join("config/league.toml"), "custom").unwrap();

        let copied = ensure_config_files(&tmp).unwrap();
        assert!(copied.is_empty());
        assert_eq!(fs::read_to_string(tmp.join("config/league.toml")).unwrap(), "custom");

        let _ = fs::remove_dir_all(&tmp);
    }

    #[test]
    fn ensure_config_files_errors_when_both_dirs_missing() {
        let tmp = std::env::temp_dir().join("gridcast_config_both_missing");
        let _ = fs::remove_dir_all(&tmp);
        fs::create_dir_all(&tmp).unwrap();
        assert!(matches!(
            ensure_config_files(&tmp).unwrap_err(),
            ConfigError::DefaultsCopyError { .. }
        ));
        let _ = fs::remove_dir_all(&tmp);
    }
}
