use std::collections::{BTreeMap, HashSet};
use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};

use clap::Parser;
use maze_chase_server::constants::TICK_MS;
use maze_chase_server::engine::{GameEngine, GameEngineOptions};
use maze_chase_server::types::{GameEvent, GameOverReason, Snapshot, StartPlayer};
use serde::Serialize;
use serde_json::{json, Value};

const BOARD_WIDTH_PX: f32 = 28.0 * 8.0;
const BOARD_HEIGHT_PX: f32 = 31.0 * 8.0;
const LONGEST_FRIGHT_MS: u64 = 10_000;

/// Headless scenario runner: plays seeded games with the built-in AI and
/// fails loudly when a tick errors or a snapshot violates an invariant.
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Cli {
    /// Run one custom scenario instead of the default batch.
    #[arg(long)]
    single: bool,
    /// Wall-clock minutes to simulate per scenario.
    #[arg(long)]
    minutes: Option<i32>,
    /// Starting level for the custom scenario.
    #[arg(long)]
    level: Option<u32>,
    #[arg(long)]
    seed: Option<u64>,
    #[arg(long)]
    match_id: Option<String>,
    /// Debug cheat: the player cannot be eaten.
    #[arg(long)]
    invincible: bool,
    /// Write the batch report to this file as pretty JSON.
    #[arg(long)]
    summary_out: Option<PathBuf>,
}

#[derive(Clone, Debug, Serialize)]
struct Scenario {
    name: String,
    minutes: i32,
    #[serde(rename = "startingLevel")]
    starting_level: u32,
    seed: u32,
    invincible: bool,
}

/// One line per scenario on stdout; everything a balance dashboard needs.
#[derive(Clone, Debug, Serialize)]
struct ScenarioReport {
    scenario: String,
    seed: u32,
    minutes: i32,
    #[serde(rename = "startingLevel")]
    starting_level: u32,
    reason: String,
    #[serde(rename = "durationMs")]
    duration_ms: u64,
    score: i32,
    #[serde(rename = "levelReached")]
    level_reached: u32,
    #[serde(rename = "dotsEaten")]
    dots_eaten: i32,
    #[serde(rename = "pelletsEaten")]
    pellets_eaten: i32,
    #[serde(rename = "ghostsEaten")]
    ghosts_eaten: i32,
    #[serde(rename = "livesLost")]
    lives_lost: i32,
    #[serde(rename = "levelsCleared")]
    levels_cleared: i32,
    anomalies: Vec<String>,
}

#[derive(Clone, Debug, Serialize)]
struct AnomalyRecord {
    tick: u64,
    message: String,
}

/// Every occurrence is kept for the log; the report carries each distinct
/// message once.
#[derive(Default)]
struct AnomalyLog {
    records: Vec<AnomalyRecord>,
    distinct: Vec<String>,
    seen: HashSet<String>,
}

impl AnomalyLog {
    fn note(&mut self, tick: u64, message: String) {
        if self.seen.insert(message.clone()) {
            self.distinct.push(message.clone());
        }
        self.records.push(AnomalyRecord { tick, message });
    }
}

struct PlayedScenario {
    report: ScenarioReport,
    records: Vec<AnomalyRecord>,
    final_tick: u64,
}

#[derive(Serialize)]
struct BatchReport {
    #[serde(rename = "matchId")]
    match_id: String,
    #[serde(rename = "startedAtMs")]
    started_at_ms: u64,
    #[serde(rename = "finishedAtMs")]
    finished_at_ms: u64,
    #[serde(rename = "scenarioCount")]
    scenario_count: usize,
    #[serde(rename = "anomalyCount")]
    anomaly_count: usize,
    #[serde(rename = "averageDurationMs")]
    average_duration_ms: u64,
    #[serde(rename = "reasonCounts")]
    reason_counts: BTreeMap<String, usize>,
    scenarios: Vec<ScenarioReport>,
}

impl BatchReport {
    fn assemble(
        match_id: String,
        started_at_ms: u64,
        finished_at_ms: u64,
        scenarios: Vec<ScenarioReport>,
    ) -> Self {
        let scenario_count = scenarios.len();
        let total_ms: u64 = scenarios.iter().map(|report| report.duration_ms).sum();
        let mut reason_counts = BTreeMap::new();
        for report in &scenarios {
            *reason_counts.entry(report.reason.clone()).or_insert(0) += 1;
        }
        Self {
            match_id,
            started_at_ms,
            finished_at_ms,
            scenario_count,
            anomaly_count: scenarios.iter().map(|report| report.anomalies.len()).sum(),
            average_duration_ms: total_ms
                .checked_div(scenario_count as u64)
                .unwrap_or_default(),
            reason_counts,
            scenarios,
        }
    }
}

/// JSON log lines on stderr, one object per line, stdout stays machine-clean.
struct JsonLog {
    match_id: String,
}

impl JsonLog {
    fn line(&self, level: &str, event: &str, fields: Value) {
        let mut record = json!({
            "timestampMs": wall_clock_ms(),
            "level": level,
            "event": event,
            "matchId": self.match_id,
        });
        if let (Some(target), Some(extra)) = (record.as_object_mut(), fields.as_object()) {
            for (key, value) in extra {
                target.insert(key.clone(), value.clone());
            }
        }
        eprintln!("{record}");
    }
}

fn main() {
    let cli = Cli::parse();
    let scenarios = pick_scenarios(&cli);
    let started_at_ms = wall_clock_ms();
    let first_seed = scenarios.first().map(|scenario| scenario.seed).unwrap_or(0);
    let log = JsonLog {
        match_id: cli
            .match_id
            .clone()
            .unwrap_or_else(|| format!("sim-{first_seed}-{started_at_ms}")),
    };

    let mut reports = Vec::new();
    let mut clean = true;
    for scenario in scenarios {
        log.line(
            "info",
            "scenario_started",
            json!({
                "scenario": scenario.name,
                "seed": scenario.seed,
                "minutes": scenario.minutes,
                "startingLevel": scenario.starting_level,
            }),
        );

        let played = play(&scenario);
        for record in &played.records {
            log.line(
                "warn",
                "anomaly_detected",
                json!({
                    "scenario": scenario.name,
                    "seed": scenario.seed,
                    "tick": record.tick,
                    "message": record.message,
                }),
            );
        }
        clean &= played.report.anomalies.is_empty();

        log.line(
            "info",
            "scenario_finished",
            json!({
                "scenario": scenario.name,
                "seed": scenario.seed,
                "tick": played.final_tick,
                "reason": played.report.reason,
                "durationMs": played.report.duration_ms,
                "score": played.report.score,
                "levelReached": played.report.level_reached,
                "anomalyCount": played.records.len(),
            }),
        );
        println!(
            "{}",
            serde_json::to_string(&played.report).expect("report should serialize")
        );
        reports.push(played.report);
    }

    let batch = BatchReport::assemble(
        log.match_id.clone(),
        started_at_ms,
        wall_clock_ms(),
        reports,
    );
    if let Some(path) = cli.summary_out.as_ref() {
        let text = serde_json::to_string_pretty(&batch).expect("batch report should serialize");
        if let Err(error) = std::fs::write(path, text) {
            log.line(
                "error",
                "summary_write_failed",
                json!({
                    "path": path.to_string_lossy(),
                    "error": error.to_string(),
                }),
            );
            std::process::exit(2);
        }
    }

    log.line(
        "info",
        "run_finished",
        json!({
            "scenarioCount": batch.scenario_count,
            "anomalyCount": batch.anomaly_count,
            "averageDurationMs": batch.average_duration_ms,
            "reasonCounts": batch.reason_counts,
        }),
    );

    if !clean {
        std::process::exit(1);
    }
}

fn pick_scenarios(cli: &Cli) -> Vec<Scenario> {
    let base_seed = cli.seed.unwrap_or_else(wall_clock_ms) as u32;
    if cli.single || cli.minutes.is_some() || cli.level.is_some() || cli.invincible {
        let minutes = cli.minutes.unwrap_or(3).clamp(1, 15);
        let starting_level = cli.level.unwrap_or(1).clamp(1, 25);
        return vec![Scenario {
            name: format!("custom-l{starting_level}-m{minutes}"),
            minutes,
            starting_level,
            seed: base_seed,
            invincible: cli.invincible,
        }];
    }

    ["quick-check", "endurance-check", "late-level-check"]
        .into_iter()
        .zip([(2, 1), (6, 1), (3, 5)])
        .enumerate()
        .map(|(idx, (name, (minutes, starting_level)))| Scenario {
            name: name.to_string(),
            minutes,
            starting_level,
            seed: base_seed.wrapping_add(idx as u32),
            invincible: false,
        })
        .collect()
}

fn play(scenario: &Scenario) -> PlayedScenario {
    let mut engine = GameEngine::new(
        StartPlayer {
            id: "ai_1".to_string(),
            name: "AI-01".to_string(),
            reconnect_token: format!("sim_{}", scenario.seed),
            connected: false,
        },
        scenario.seed,
        GameEngineOptions {
            starting_level: Some(scenario.starting_level),
            invincible_player: scenario.invincible,
        },
    );

    let mut anomalies = AnomalyLog::default();
    let mut counts = [0i32; 5];
    let [dots, pellets, ghosts, lives, levels] = &mut counts;
    let mut final_tick = 0u64;
    let mut final_score = 0;
    let mut final_level = scenario.starting_level;
    let mut reason = "time_cap".to_string();

    for _ in 0..(scenario.minutes as u64 * 60_000 / TICK_MS) {
        if let Err(tick_error) = engine.step(TICK_MS) {
            anomalies.note(final_tick, format!("tick failed: {tick_error}"));
            engine.abort();
        }
        let snapshot = engine.build_snapshot(true);
        final_tick = snapshot.tick;
        final_score = snapshot.score;
        final_level = snapshot.level;

        for message in audit_snapshot(&snapshot) {
            anomalies.note(snapshot.tick, message);
        }
        for event in &snapshot.events {
            match event {
                GameEvent::DotEaten { .. } => *dots += 1,
                GameEvent::PowerPelletEaten { .. } => *pellets += 1,
                GameEvent::GhostEaten { .. } => *ghosts += 1,
                GameEvent::LifeLost { .. } => *lives += 1,
                GameEvent::LevelCleared { .. } => *levels += 1,
                _ => {}
            }
        }

        if engine.is_ended() {
            reason = match engine.build_summary().reason {
                GameOverReason::OutOfLives => "out_of_lives",
                GameOverReason::Aborted => "aborted",
            }
            .to_string();
            break;
        }
    }

    let [dots, pellets, ghosts, lives, levels] = counts;
    PlayedScenario {
        report: ScenarioReport {
            scenario: scenario.name.clone(),
            seed: scenario.seed,
            minutes: scenario.minutes,
            starting_level: scenario.starting_level,
            reason,
            duration_ms: engine.build_summary().duration_ms,
            score: final_score,
            level_reached: final_level,
            dots_eaten: dots,
            pellets_eaten: pellets,
            ghosts_eaten: ghosts,
            lives_lost: lives,
            levels_cleared: levels,
            anomalies: anomalies.distinct,
        },
        records: anomalies.records,
        final_tick,
    }
}

fn audit_snapshot(snapshot: &Snapshot) -> Vec<String> {
    let mut findings = Vec::new();
    if snapshot.score < 0 {
        findings.push(format!("negative score: {}", snapshot.score));
    }
    if snapshot.lives < 0 {
        findings.push(format!("negative lives: {}", snapshot.lives));
    }
    if !(0..=240).contains(&snapshot.dots_remaining) {
        findings.push(format!(
            "dots remaining out of range: {}",
            snapshot.dots_remaining
        ));
    }
    if !on_board(snapshot.player.x, snapshot.player.y) {
        findings.push(format!(
            "player off the board: ({}, {})",
            snapshot.player.x, snapshot.player.y
        ));
    }
    for ghost in &snapshot.ghosts {
        if !on_board(ghost.x, ghost.y) {
            findings.push(format!(
                "ghost off the board: {:?} ({}, {})",
                ghost.id, ghost.x, ghost.y
            ));
        }
    }
    if snapshot.fright_ms_left > LONGEST_FRIGHT_MS {
        findings.push(format!(
            "fright window too long: {}ms",
            snapshot.fright_ms_left
        ));
    }
    findings
}

fn on_board(x: f32, y: f32) -> bool {
    x.is_finite()
        && y.is_finite()
        && (0.0..BOARD_WIDTH_PX).contains(&x)
        && (0.0..BOARD_HEIGHT_PX).contains(&y)
}

fn wall_clock_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}
