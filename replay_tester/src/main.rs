use anyhow::{Context, Result};
use junction_vision::{BoundingBox, JunctionConfig, JunctionPipeline};
use serde::Deserialize;
use std::env;
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;

/// One recorded tick. Boxes are `[x1, y1, x2, y2]`.
#[derive(Debug, Deserialize)]
struct RecordedTick {
    /// Seconds since the previous tick.
    #[serde(default = "default_dt")]
    dt: f64,
    #[serde(default)]
    a: Vec<[i32; 4]>,
    #[serde(default)]
    b: Vec<[i32; 4]>,
}

fn default_dt() -> f64 {
    2.0
}

fn to_boxes(raw: &[[i32; 4]]) -> Vec<BoundingBox> {
    raw.iter()
        .filter_map(|&[x1, y1, x2, y2]| BoundingBox::new(x1, y1, x2, y2))
        .collect()
}

/// Moves the synthetic clock forward by `dt` seconds. Negative and NaN steps
/// count as zero; steps too large for a `Duration` are an error.
fn advance(clock: Duration, dt: f64) -> Result<Duration> {
    let step = Duration::try_from_secs_f64(dt.max(0.0))
        .with_context(|| format!("dt {dt} is not a representable step"))?;
    clock
        .checked_add(step)
        .with_context(|| format!("clock overflowed advancing by {dt}s"))
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    // --- 1. Argument Parsing & Setup ---
    let args: Vec<String> = env::args().collect();
    if args.len() < 2 {
        println!("Usage: replay_tester <detections.jsonl> [config.yaml]");
        return Ok(());
    }
    let input_path = &args[1];
    let config = match args.get(2) {
        Some(path) => JunctionConfig::load(path).with_context(|| format!("loading {path}"))?,
        None => JunctionConfig::default(),
    };

    // --- 2. Pipeline on a synthetic clock ---
    let start = Instant::now();
    let mut clock = Duration::ZERO;
    let mut pipeline = JunctionPipeline::new_at(config, start);

    let file = File::open(input_path).with_context(|| format!("opening {input_path}"))?;
    let reader = BufReader::new(file);
    let mut out = BufWriter::new(std::io::stdout().lock());

    // --- 3. Replay Loop ---
    for (line_no, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let tick: RecordedTick = serde_json::from_str(&line)
            .with_context(|| format!("line {}: not a recorded tick", line_no + 1))?;

        let line_ctx = || format!("line {}", line_no + 1);
        clock = advance(clock, tick.dt).with_context(line_ctx)?;
        let now = start
            .checked_add(clock)
            .with_context(|| format!("line {}: clock left the Instant range", line_no + 1))?;
        let snapshot = pipeline.process_tick_at(&to_boxes(&tick.a), &to_boxes(&tick.b), now);
        serde_json::to_writer(&mut out, &snapshot)?;
        out.write_all(b"\n")?;
    }

    out.flush()?;
    Ok(())
}
