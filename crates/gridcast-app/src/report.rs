// CSV report writers and the JSON run summary.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Context;
use chrono::{DateTime, Utc};
use gridcast_core::schedule::StandingsRow;
use gridcast_football::defense::DefenseFactors;
use gridcast_football::features::FeatureTable;
use gridcast_football::leaders::LeaderRow;
use gridcast_football::pipeline::ProjectionReport;
use gridcast_football::rankings::PowerRanking;
use gridcast_football::standings::{MatchupResult, Starter};
use serde::Serialize;
use tracing::info;

// ---------------------------------------------------------------------------
// Run summary
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
pub struct OutputFile {
    pub path: String,
    pub rows: usize,
}

/// Written next to the CSV outputs as `run_summary.json`.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub command: String,
    pub generated_at: DateTime<Utc>,
    pub outputs: Vec<OutputFile>,
    pub issues: Vec<String>,
}

impl RunSummary {
    pub fn new(command: &str) -> Self {
        RunSummary {
            command: command.to_string(),
            generated_at: Utc::now(),
            outputs: Vec::new(),
            issues: Vec::new(),
        }
    }

    fn record(&mut self, path: &Path, rows: usize) {
        info!("wrote {} rows to {}", rows, path.display());
        self.outputs.push(OutputFile {
            path: path.display().to_string(),
            rows,
        });
    }

    pub fn write(&self, dir: &Path) -> anyhow::Result<PathBuf> {
        let path = dir.join("run_summary.json");
        let json = serde_json::to_string_pretty(self).context("failed to serialize run summary")?;
        fs::write(&path, json).with_context(|| format!("failed to write {}", path.display()))?;
        Ok(path)
    }

    /// Short human-readable recap for stdout.
    pub fn print(&self) {
        println!("gridcast {} ({})", self.command, self.generated_at.format("%Y-%m-%d %H:%M:%S UTC"));
        for out in &self.outputs {
            println!("  {:>5} rows  {}", out.rows, out.path);
        }
        if !self.issues.is_empty() {
            println!("  {} issue(s) skipped; see run_summary.json", self.issues.len());
        }
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

pub fn ensure_output_dir(dir: &Path) -> anyhow::Result<()> {
    fs::create_dir_all(dir).with_context(|| format!("failed to create output dir {}", dir.display()))
}

fn writer(path: &Path) -> anyhow::Result<csv::Writer<fs::File>> {
    csv::Writer::from_path(path).with_context(|| format!("failed to create {}", path.display()))
}

fn fmt_value(v: f64) -> String {
    format!("{v:.2}")
}

// ---------------------------------------------------------------------------
// Writers
// ---------------------------------------------------------------------------

pub fn write_feature_table(dir: &Path, table: &FeatureTable, summary: &mut RunSummary) -> anyhow::Result<()> {
    let path = dir.join(format!("features_{}.csv", table.position.file_label()));
    let mut wtr = writer(&path)?;
    wtr.write_record(table.headers())?;
    for row in &table.rows {
        let mut record = vec![
            row.player.clone(),
            row.team.clone(),
            row.position.to_string(),
            row.week.to_string(),
            row.opponent.clone().unwrap_or_default(),
            fmt_value(row.fpts),
        ];
        record.extend(row.features.iter().map(|v| fmt_value(*v)));
        record.push(row.fpts_class.to_string());
        wtr.write_record(&record)?;
    }
    wtr.flush()?;
    summary.record(&path, table.rows.len());
    Ok(())
}

pub fn write_projections(dir: &Path, report: &ProjectionReport, summary: &mut RunSummary) -> anyhow::Result<()> {
    let path = dir.join("projections.csv");
    let mut wtr = writer(&path)?;
    let mut header: Vec<String> = ["PLAYER", "TEAM", "POS", "OWNER", "WEEK", "OPPONENT"]
        .iter()
        .map(|s| s.to_string())
        .collect();
    header.extend(report.stats.iter().cloned());
    header.push("PROJ_FPTS".into());
    wtr.write_record(&header)?;

    for p in &report.run.projections {
        let mut record = vec![
            p.player.clone(),
            p.team.clone(),
            p.position.to_string(),
            p.owner.clone().unwrap_or_else(|| "FA".into()),
            p.week.to_string(),
            p.opponent.clone(),
        ];
        record.extend(
            report
                .stats
                .iter()
                .map(|s| fmt_value(p.stats.get(s).copied().unwrap_or(0.0))),
        );
        record.push(fmt_value(p.proj_fpts));
        wtr.write_record(&record)?;
    }
    wtr.flush()?;
    summary.record(&path, report.run.projections.len());
    summary
        .issues
        .extend(report.run.issues.iter().map(|e| e.to_string()));

    write_defense_factors(dir, &report.factors, summary)
}

#[derive(Serialize)]
struct FactorRecord<'a> {
    #[serde(rename = "OPPONENT")]
    opponent: &'a str,
    #[serde(rename = "POS")]
    position: String,
    #[serde(rename = "STAT")]
    stat: &'a str,
    #[serde(rename = "FACTOR")]
    factor: f64,
}

fn write_defense_factors(dir: &Path, factors: &DefenseFactors, summary: &mut RunSummary) -> anyhow::Result<()> {
    let path = dir.join("defense_factors.csv");
    let mut wtr = writer(&path)?;
    for (opponent, position, stat, factor) in factors.iter() {
        wtr.serialize(FactorRecord {
            opponent,
            position: position.to_string(),
            stat,
            factor,
        })?;
    }
    wtr.flush()?;
    summary.record(&path, factors.len());
    Ok(())
}

#[derive(Serialize)]
struct MatchupRecord<'a> {
    #[serde(rename = "OWNER")]
    owner: &'a str,
    #[serde(rename = "WEEK")]
    week: String,
    #[serde(rename = "OPPONENT")]
    opponent: &'a str,
    #[serde(rename = "PTS")]
    points: f64,
    #[serde(rename = "OPP_PTS")]
    opponent_points: f64,
    #[serde(rename = "RESULT")]
    result: &'static str,
    #[serde(rename = "DIFF")]
    diff: f64,
}

#[derive(Serialize)]
struct StarterRecord<'a> {
    #[serde(rename = "OWNER")]
    owner: &'a str,
    #[serde(rename = "WEEK")]
    week: String,
    #[serde(rename = "STARTPOS")]
    slot: &'a str,
    #[serde(rename = "PLAYER")]
    player: &'a str,
    #[serde(rename = "PROJ_FPTS")]
    proj_fpts: f64,
}

pub fn write_simulation(
    dir: &Path,
    starters: &[Starter],
    matchups: &[MatchupResult],
    standings: &[StandingsRow],
    summary: &mut RunSummary,
) -> anyhow::Result<()> {
    let path = dir.join("lineups.csv");
    let mut wtr = writer(&path)?;
    for s in starters {
        wtr.serialize(StarterRecord {
            owner: &s.owner,
            week: s.week.to_string(),
            slot: &s.slot,
            player: &s.player,
            proj_fpts: s.proj_fpts,
        })?;
    }
    wtr.flush()?;
    summary.record(&path, starters.len());

    let path = dir.join("matchups.csv");
    let mut wtr = writer(&path)?;
    for m in matchups {
        wtr.serialize(MatchupRecord {
            owner: &m.owner,
            week: m.week.to_string(),
            opponent: &m.opponent,
            points: m.points,
            opponent_points: m.opponent_points,
            result: m.outcome.as_str(),
            diff: m.diff,
        })?;
    }
    wtr.flush()?;
    summary.record(&path, matchups.len());

    let path = dir.join("standings.csv");
    let mut wtr = writer(&path)?;
    for row in standings {
        wtr.serialize(row)?;
    }
    wtr.flush()?;
    summary.record(&path, standings.len());
    Ok(())
}

#[derive(Serialize)]
struct RankingRecord<'a> {
    #[serde(rename = "RANK")]
    rank: usize,
    #[serde(rename = "OWNER")]
    owner: &'a str,
    #[serde(rename = "STARTPOS")]
    slot: &'a str,
    #[serde(rename = "PLAYER")]
    player: &'a str,
    #[serde(rename = "FPTS_CLASS")]
    class_value: f64,
    #[serde(rename = "FPTS")]
    fpts: f64,
}

/// One row per starter plus a `TOTAL` row per owner, in ranking order.
pub fn write_rankings(dir: &Path, rankings: &[PowerRanking], summary: &mut RunSummary) -> anyhow::Result<()> {
    let path = dir.join("rankings.csv");
    let mut wtr = writer(&path)?;
    let mut rows = 0usize;
    for (i, ranking) in rankings.iter().enumerate() {
        for slot in &ranking.slots {
            wtr.serialize(RankingRecord {
                rank: i + 1,
                owner: &ranking.owner,
                slot: &slot.slot,
                player: &slot.player,
                class_value: slot.class_value,
                fpts: slot.fpts,
            })?;
            rows += 1;
        }
        wtr.serialize(RankingRecord {
            rank: i + 1,
            owner: &ranking.owner,
            slot: "TOTAL",
            player: "",
            class_value: ranking.total_class,
            fpts: ranking.total_fpts,
        })?;
        rows += 1;
    }
    wtr.flush()?;
    summary.record(&path, rows);
    Ok(())
}

pub fn write_leaders(
    dir: &Path,
    stat: &str,
    tiebreak: Option<&str>,
    leaders: &[LeaderRow],
    summary: &mut RunSummary,
) -> anyhow::Result<()> {
    let path = dir.join("leaders.csv");
    let mut wtr = writer(&path)?;
    let mut header = vec!["PLAYER".to_string(), "POS".to_string(), stat.to_string()];
    if let Some(t) = tiebreak {
        header.push(t.to_string());
    }
    wtr.write_record(&header)?;
    for row in leaders {
        let mut record = vec![row.player.clone(), row.position.to_string(), fmt_value(row.total)];
        if let Some(t) = row.tiebreak_total {
            record.push(fmt_value(t));
        }
        wtr.write_record(&record)?;
    }
    wtr.flush()?;
    summary.record(&path, leaders.len());
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
