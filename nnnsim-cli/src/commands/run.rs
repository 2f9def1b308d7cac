//! `nnnsim run`: loads a scenario, runs it and prints what every node saw.

use crate::utils::{format_bytes, print_header, Timer};
use anyhow::{Context, Result};
use log::{debug, info};
use nnnsim_common::time::{format_duration, parse_duration};
use nnnsim_common::NodeId;
use nnnsim_core::{ScenarioConfig, Simulator};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::time::sleep;

/// Consumer, router and producer on a line, with routes towards the producer.
const DEFAULT_SCENARIO: &str = r#"{
    "Nodes": [{"Id": "consumer"}, {"Id": "router"}, {"Id": "producer"}],
    "Links": [
        {"A": "consumer", "B": "router", "Delay": "10ms"},
        {"A": "router", "B": "producer", "Delay": "10ms"}
    ],
    "Routes": [
        {"Node": "consumer", "Prefix": "/waseda/satolab", "Link": 0},
        {"Node": "router", "Prefix": "/waseda/satolab", "Link": 1}
    ],
    "Apps": [
        {"Node": "producer", "Kind": "Producer", "Prefix": "/waseda/satolab", "PayloadSize": 1024},
        {"Node": "consumer", "Kind": "Consumer", "Prefix": "/waseda/satolab", "Frequency": 10.0, "MaxSeq": 20}
    ]
}"#;

const DEFAULT_UNTIL: Duration = Duration::from_secs(10);

/// Run settings after defaults, settings file and `NNNSIM_*` variables.
#[derive(Debug, Default, Deserialize, PartialEq)]
pub struct RunSettings {
    pub until: Option<String>,
    pub json: bool,
    pub realtime: bool,
}

/// Values given on the command line; they win over every other layer.
#[derive(Debug, Default)]
pub struct Overrides {
    pub until: Option<String>,
    pub json: bool,
    pub realtime: bool,
}

pub fn load_settings(path: Option<&Path>) -> Result<RunSettings> {
    let mut builder = config::Config::builder()
        .set_default("json", false)?
        .set_default("realtime", false)?;
    if let Some(path) = path {
        builder = builder.add_source(config::File::from(path));
    }
    let settings = builder
        .add_source(config::Environment::with_prefix("NNNSIM"))
        .build()
        .context("Failed to read run settings")?
        .try_deserialize()
        .context("Invalid run settings")?;
    Ok(settings)
}

pub fn load_scenario(path: Option<&Path>) -> Result<ScenarioConfig> {
    let scenario = match path {
        Some(path) => {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read scenario {}", path.display()))?;
            serde_json::from_str(&text)
                .with_context(|| format!("Invalid scenario {}", path.display()))?
        }
        None => {
            debug!("No scenario given, using the built-in line topology");
            serde_json::from_str(DEFAULT_SCENARIO)?
        }
    };
    Ok(scenario)
}

pub async fn run_scenario(
    config: Option<PathBuf>,
    settings: Option<PathBuf>,
    overrides: Overrides,
) -> Result<()> {
    let settings = load_settings(settings.as_deref())?;
    let scenario = load_scenario(config.as_deref())?;

    let until = match overrides.until.or(settings.until) {
        Some(text) => parse_duration(&text).context("Invalid --until")?,
        None => scenario.stop_time.unwrap_or(DEFAULT_UNTIL),
    };
    let json = overrides.json || settings.json;
    let realtime = overrides.realtime || settings.realtime;

    let mut sim = Simulator::from_scenario(&scenario).context("Failed to build scenario")?;
    info!("Running until {} (realtime: {})", format_duration(until), realtime);

    let fired = {
        let _timer = Timer::new("simulation");
        if realtime {
            pace(&mut sim, until).await
        } else {
            sim.run_until(until)
        }
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&sim.reports())?);
    } else {
        print_report(&sim, fired);
    }
    Ok(())
}

/// Fires events no faster than the wall clock allows.
async fn pace(sim: &mut Simulator, until: Duration) -> usize {
    let mut fired = 0;
    while let Some(at) = sim.next_event_time() {
        if at > until {
            break;
        }
        let wait = at.saturating_sub(sim.now());
        if !wait.is_zero() {
            sleep(wait).await;
        }
        sim.step();
        fired += 1;
    }
    fired + sim.run_until(until)
}

fn print_report(sim: &Simulator, fired: usize) {
    print_header(&format!(
        "Simulation report at {} ({} events)",
        format_duration(sim.now()),
        fired
    ));
    println!(
        "{:<10} {:<8} {:>9} {:>9} {:>9} {:>8} {:>6} {:>11} {:>11}",
        "Node", "Name", "Int in", "Data in", "Data out", "CS hits", "PIT", "Sent", "Received"
    );

    for report in sim.reports() {
        let label = sim
            .label(NodeId(report.node))
            .map(str::to_string)
            .unwrap_or_else(|| report.node.to_string());
        let name = report
            .name
            .as_ref()
            .map(|n| n.to_string())
            .unwrap_or_else(|| "-".into());
        let metric = |key: &str| report.metrics.get(key).copied().unwrap_or(0);
        println!(
            "{:<10} {:<8} {:>9} {:>9} {:>9} {:>8} {:>6} {:>11} {:>11}",
            label,
            name,
            metric("interests_received"),
            metric("data_received"),
            metric("data_sent"),
            metric("cs_hits"),
            report.pit_entries,
            format_bytes(metric("bytes_sent")),
            format_bytes(metric("bytes_received")),
        );
        for (app, counters) in &report.apps {
            let line: Vec<String> = counters.iter().map(|(k, v)| format!("{}={}", k, v)).collect();
            println!("  app {}: {}", app, line.join(" "));
        }
    }
}
