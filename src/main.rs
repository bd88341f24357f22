// =============================================================================
// Borealis Engine — Main Entry Point
// =============================================================================
//
// Replays a CSV of OHLCV bars through the decision pipeline and prints one
// decision record per bar.  Expected row format:
//
//   open,high,low,close,volume[,news]
//
// A header row is skipped automatically; the optional sixth column is free
// text fed to the sentiment adapter.
// =============================================================================

// ── Module declarations ──────────────────────────────────────────────────────
mod features;
mod forecasting;
mod history;
mod indicators;
mod orchestrator;
mod policy;
mod regime;
mod runtime_config;
mod sentiment;
mod signals;
mod types;

use anyhow::{Context, Result};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::orchestrator::Orchestrator;
use crate::runtime_config::EngineConfig;
use crate::types::Bar;

fn main() -> Result<()> {
    // ── 1. Environment & config ──────────────────────────────────────────
    let _ = dotenv::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!("╔══════════════════════════════════════════════════════════╗");
    info!("║        Borealis Engine — Starting Up                     ║");
    info!("╚══════════════════════════════════════════════════════════╝");

    let config = EngineConfig::load("engine_config.json").unwrap_or_else(|e| {
        warn!(error = %e, "Failed to load config, using defaults");
        EngineConfig::default()
    });

    let csv_path = std::env::args()
        .nth(1)
        .context("usage: borealis-engine <bars.csv>")?;

    let mut engine = Orchestrator::new(config)?;

    if let Ok(signal) = std::env::var("BOREALIS_DAILY_SIGNAL") {
        let parsed: i32 = signal
            .trim()
            .parse()
            .with_context(|| format!("invalid BOREALIS_DAILY_SIGNAL: {signal}"))?;
        engine.set_daily_signal(parsed);
        info!(signal = parsed.clamp(-1, 1), "daily volatility signal set");
    }

    // ── 2. Bar replay ────────────────────────────────────────────────────
    let content = std::fs::read_to_string(&csv_path)
        .with_context(|| format!("failed to read bars from {csv_path}"))?;

    let mut processed = 0_usize;
    for (line_no, line) in content.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let (bar, news) = match parse_bar_line(line) {
            Ok(parsed) => parsed,
            Err(e) => {
                if line_no == 0 {
                    // Header row.
                    continue;
                }
                warn!(line = line_no + 1, error = %e, "skipping malformed bar row");
                continue;
            }
        };

        let record = engine.process_bar(bar, &news);
        processed += 1;

        println!(
            "{}",
            serde_json::to_string(&record).context("failed to serialise decision record")?
        );
    }

    // ── 3. Session close ─────────────────────────────────────────────────
    let terminal = engine.terminal_reward();
    info!(
        bars = processed,
        inventory = engine.inventory(),
        cumulative_pnl = format!("{:.4}", engine.cumulative_pnl()),
        terminal_penalty = format!("{terminal:.6}"),
        "replay finished"
    );

    Ok(())
}

/// Parse one CSV row into a bar plus optional news text.
fn parse_bar_line(line: &str) -> Result<(Bar, String)> {
    let fields: Vec<&str> = line.splitn(6, ',').collect();
    if fields.len() < 5 {
        anyhow::bail!("expected at least 5 comma-separated fields, got {}", fields.len());
    }

    let parse = |field: &str, name: &str| -> Result<f64> {
        field
            .trim()
            .parse::<f64>()
            .with_context(|| format!("invalid {name}: {field}"))
    };

    let bar = Bar::new(
        parse(fields[0], "open")?,
        parse(fields[1], "high")?,
        parse(fields[2], "low")?,
        parse(fields[3], "close")?,
        parse(fields[4], "volume")?,
    );
    let news = fields.get(5).map(|s| s.trim().to_string()).unwrap_or_default();

    Ok((bar, news))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_plain_bar_row() {
        let (bar, news) = parse_bar_line("100.0,101.0,99.5,100.5,2500").unwrap();
        assert!((bar.close - 100.5).abs() < f64::EPSILON);
        assert!((bar.volume - 2500.0).abs() < f64::EPSILON);
        assert!(news.is_empty());
    }

    #[test]
    fn parses_row_with_news() {
        let (_, news) =
            parse_bar_line("100,101,99,100.5,2500, central bank holds rates").unwrap();
        assert_eq!(news, "central bank holds rates");
    }

    #[test]
    fn rejects_short_rows() {
        assert!(parse_bar_line("100,101,99").is_err());
    }

    #[test]
    fn rejects_header_row() {
        assert!(parse_bar_line("open,high,low,close,volume").is_err());
    }
}
