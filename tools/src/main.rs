//! rop-runner: headless reorder-point runner.
//!
//! Usage:
//!   rop-runner --db snapshot.db --mode simulate --out trace.csv
//!   rop-runner --db snapshot.db --mode report --date 2023-06-05
//!   rop-runner --db snapshot.db --mode classify --date 2023-06-05 --out groups.csv
//!   rop-runner --db snapshot.db --mode simulate --forecast forecast.json --format jsonl

use anyhow::{bail, Context, Result};
use chrono::NaiveDate;
use rop_core::{
    config::{DemandMode, RopConfig},
    forecast::ForecastDemandProvider,
    reorder::ReorderPointEngine,
    report::{ClassificationRow, ReorderReport, SimulationRow},
    simulation::OrderSimulator,
    source::SimulationInput,
    store::SimStore,
    types::{VariationGroup, VolumeGroup},
};
use serde::Serialize;
use std::env;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;

#[derive(Clone, Copy, PartialEq, Eq)]
enum Mode {
    Simulate,
    Report,
    Classify,
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Format {
    Csv,
    JsonLines,
}

fn main() -> Result<()> {
    env_logger::init();

    let args: Vec<String> = env::args().collect();
    let db = str_arg(&args, "--db").unwrap_or(":memory:");
    let data_dir = str_arg(&args, "--data-dir").unwrap_or("./data");
    let out = str_arg(&args, "--out");
    let forecast_path = str_arg(&args, "--forecast");
    let iterations = parse_arg(&args, "--iterations", 0u32);
    let seed = parse_arg(&args, "--seed", 0u64);

    let mode = match str_arg(&args, "--mode").unwrap_or("simulate") {
        "simulate" => Mode::Simulate,
        "report" => Mode::Report,
        "classify" => Mode::Classify,
        other => bail!("unknown --mode {other} (expected simulate, report or classify)"),
    };
    let format = match str_arg(&args, "--format").unwrap_or("csv") {
        "csv" => Format::Csv,
        "jsonl" => Format::JsonLines,
        other => bail!("unknown --format {other} (expected csv or jsonl)"),
    };

    let mut config = load_config(data_dir)?;
    if let Some(raw) = str_arg(&args, "--date") {
        config.simulation.start_date = NaiveDate::parse_from_str(raw, "%Y-%m-%d")
            .with_context(|| format!("--date {raw} is not YYYY-MM-DD"))?;
    }
    if iterations > 0 {
        config.simulation.iterations = iterations;
    }
    if seed > 0 {
        config.simulation.seed = seed;
    }
    let forecast = match forecast_path {
        Some(path) => {
            config.simulation.demand_mode = DemandMode::Forecast;
            Some(ForecastDemandProvider::from_path(path).with_context(|| format!("forecast {path}"))?)
        }
        None => None,
    };
    let date = config.simulation.start_date;

    // Rows go to stdout when no --out is given; keep the banner off it then.
    if out.is_some() {
        println!("rop-runner");
        println!("  db:        {db}");
        println!("  data_dir:  {data_dir}");
        println!("  date:      {date}");
        println!("  demand:    {:?}", config.simulation.demand_mode);
        println!();
    }

    let store = SimStore::open(db)?;
    store.migrate()?;
    let input = SimulationInput::fetch(&store, date, config.simulation.backlog_lookback_months)?;

    match mode {
        Mode::Simulate => run_simulation(&config, input, forecast, out, format),
        Mode::Report => run_report(&config, input, forecast, out, format),
        Mode::Classify => run_classification(&config, input, out, format),
    }
}

fn load_config(data_dir: &str) -> Result<RopConfig> {
    if Path::new(data_dir).join("rop_config.json").exists() {
        RopConfig::load(data_dir)
    } else {
        log::warn!("no rop_config.json in {data_dir}, using defaults");
        Ok(RopConfig::default())
    }
}

fn run_simulation(
    config: &RopConfig,
    input: SimulationInput,
    forecast: Option<ForecastDemandProvider>,
    out: Option<&str>,
    format: Format,
) -> Result<()> {
    let mut simulator = OrderSimulator::build(config, input, forecast)?;
    let outcome = simulator.run()?;
    let rows = SimulationRow::from_trace(&outcome.trace);
    write_rows(&rows, out, format)?;

    eprintln!("=== Simulation summary ===");
    eprintln!("  tracked variants: {}", simulator.tracked().len());
    eprintln!("  steps:            {}", outcome.steps);
    if let Some(last) = outcome.last_date {
        eprintln!("  last order date:  {last}");
    }
    eprintln!("  decisions:        {}", outcome.trace.len());
    eprintln!("  orders placed:    {}", outcome.orders().count());
    eprintln!("  units ordered:    {}", outcome.ordered_quantity());
    Ok(())
}

fn run_report(
    config: &RopConfig,
    input: SimulationInput,
    forecast: Option<ForecastDemandProvider>,
    out: Option<&str>,
    format: Format,
) -> Result<()> {
    let date = config.simulation.start_date;
    let mode = config.simulation.demand_mode;
    let items = input.stock.clone();
    let mut engine = ReorderPointEngine::new(
        config,
        input.demand,
        input.lead,
        input.product_vendors,
        forecast,
        date,
    )?;
    let report = ReorderReport::build(&mut engine, &items, date, mode, config.reorder.max_lead_std_dev)?;
    write_rows(&report.rows, out, format)?;

    eprintln!("=== ROP report {date} ===");
    eprintln!("  rows:          {}", report.totals.rows);
    eprintln!("  to order:      {}", report.totals.orders);
    eprintln!("  rop order qty: {}", report.totals.rop_order_quantity);
    Ok(())
}

fn run_classification(
    config: &RopConfig,
    input: SimulationInput,
    out: Option<&str>,
    format: Format,
) -> Result<()> {
    let date = config.simulation.start_date;
    let mut engine = ReorderPointEngine::new(
        config,
        input.demand,
        input.lead,
        input.product_vendors,
        None,
        date,
    )?;
    let rows = ClassificationRow::collect(&mut engine, date)?;
    write_rows(&rows, out, format)?;

    let Some(summary) = engine.classifier().summary() else {
        bail!("classification did not run for {date}");
    };

    eprintln!("=== Classification {date} ===");
    eprintln!("  variants:       {}", summary.variants);
    eprintln!("  total quantity: {}", summary.total_quantity);
    let header: String = VariationGroup::ALL
        .iter()
        .map(|variation| format!(" {:>6}", variation.label()))
        .collect();
    eprintln!("  {:>4}{header}", "");
    for (row, volume) in VolumeGroup::ALL.into_iter().enumerate() {
        let counts: String = summary.matrix[row].iter().map(|count| format!(" {count:>6}")).collect();
        eprintln!("  {:>4}{counts}", volume.label());
    }
    Ok(())
}

fn write_rows<T: Serialize>(rows: &[T], out: Option<&str>, format: Format) -> Result<()> {
    let sink: Box<dyn Write> = match out {
        Some(path) => Box::new(BufWriter::new(
            File::create(path).with_context(|| format!("cannot create {path}"))?,
        )),
        None => Box::new(io::stdout().lock()),
    };

    match format {
        Format::Csv => {
            let mut writer = csv::Writer::from_writer(sink);
            for row in rows {
                writer.serialize(row)?;
            }
            writer.flush()?;
        }
        Format::JsonLines => {
            let mut sink = sink;
            for row in rows {
                writeln!(sink, "{}", serde_json::to_string(row)?)?;
            }
            sink.flush()?;
        }
    }

    if let Some(path) = out {
        eprintln!("wrote {} rows to {path}", rows.len());
    }
    Ok(())
}

fn str_arg<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
    args.windows(2).find(|w| w[0] == flag).map(|w| w[1].as_str())
}

fn parse_arg<T: std::str::FromStr + Copy>(args: &[String], flag: &str, default: T) -> T {
    args.windows(2)
        .find(|w| w[0] == flag)
        .and_then(|w| w[1].parse().ok())
        .unwrap_or(default)
}
