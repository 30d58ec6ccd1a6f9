#![warn(clippy::all)]
#![allow(clippy::pedantic)]

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use console::{pad_str, style, Alignment, Term};
use tracing::debug;

use kabu_common::config::Config;
use kabu_common::logging::init_logging_with_exclusions;
use kabu_screener::filter::FilterModel;
use kabu_screener::render::{ChangeClass, RenderedTable, TableRow};
use kabu_screener::{
    DateScope, HttpScreeningClient, Navigator, QueryStatus, ScreeningSession, SnapshotStore,
    StockField,
};

/// Screening console for Japanese equities.
#[derive(Parser, Debug)]
#[command(name = "kabu-screener")]
#[command(version)]
#[command(about = "Filter, sort and snapshot stock screening results", long_about = None)]
struct Cli {
    /// Config file (default: ~/.kabu/config.json)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run a screening query and print the results
    Screen {
        /// Filter as key=value, or a bare checkbox key (repeatable)
        #[arg(short, long = "filter", value_name = "KEY=VALUE")]
        filters: Vec<String>,

        /// Trading date (YYYY-MM-DD) or "latest"
        #[arg(long, default_value = "latest")]
        date: String,

        /// Column to sort by; repeating a column toggles its direction
        #[arg(short, long = "sort", value_name = "COLUMN")]
        sorts: Vec<String>,

        /// Print the raw records as JSON
        #[arg(long)]
        json: bool,

        /// Do not capture an analysis snapshot
        #[arg(long)]
        no_snapshot: bool,
    },

    /// List every filter criterion
    Criteria,

    /// Show the last captured analysis snapshot
    Snapshot {
        /// Print the snapshot as JSON
        #[arg(long)]
        json: bool,

        /// Delete the snapshot
        #[arg(long)]
        clear: bool,
    },

    /// Print the chart link for a code in the last snapshot
    Chart {
        /// Security code
        code: String,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        eprintln!("{} {:#}", style("error:").red().bold(), e);
        let code = e
            .downcast_ref::<kabu_common::Error>()
            .map_or(1, kabu_common::Error::exit_code);
        std::process::exit(code);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let mut config = match &cli.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };
    config.apply_env_overrides();
    config.validate()?;

    init_logging_with_exclusions(
        &config.observability.log_level,
        &config.observability.log_format,
        &config.observability.excluded_targets,
    );
    debug!(base_url = %config.screener.base_url, "Configuration loaded");

    match cli.command {
        Commands::Screen {
            filters,
            date,
            sorts,
            json,
            no_snapshot,
        } => run_screen(&config, &filters, &date, &sorts, json, no_snapshot).await,
        Commands::Criteria => {
            print_criteria();
            Ok(())
        }
        Commands::Snapshot { json, clear } => run_snapshot(&config, json, clear),
        Commands::Chart { code } => run_chart(&config, &code),
    }
}

fn open_store(config: &Config) -> Result<SnapshotStore> {
    SnapshotStore::open(config.snapshot.resolved_path())
}

async fn run_screen(
    config: &Config,
    filters: &[String],
    date: &str,
    sorts: &[String],
    json: bool,
    no_snapshot: bool,
) -> Result<()> {
    let client = HttpScreeningClient::from_config(&config.screener)?;
    let navigator = Navigator::new(&config.screener.base_url)?;
    let mut session = ScreeningSession::new(navigator);

    for assignment in filters {
        session.filters_mut().assign(assignment)?;
    }
    session.set_date_scope(DateScope::parse(date)?);

    // Resolve sort columns before spending a round trip
    let columns = sorts
        .iter()
        .map(|key| {
            StockField::from_key(key).with_context(|| format!("Unknown sort column: {}", key))
        })
        .collect::<Result<Vec<_>>>()?;

    // Progress line on interactive stderr, cleared once the query returns
    let term = Term::stderr();
    let show_progress = term.is_term();
    if show_progress {
        term.write_line(&format!(
            "{} スクリーニング中... (条件 {} 件)",
            style("⋯").cyan(),
            session.filters().active_count()
        ))?;
    }
    let outcome = session.submit(&client).await;
    if show_progress {
        term.clear_last_lines(1)?;
    }
    outcome?;

    for column in columns {
        session.sort_by(column);
    }

    if json {
        println!("{}", serde_json::to_string_pretty(session.results())?);
        return Ok(());
    }

    let table = if no_snapshot {
        session.render()
    } else {
        let store = open_store(config)?;
        session.present(&store)?.0
    };

    print_summary(&session);
    print_table(&session.headers(), &table);

    if let Some(link) = session.analysis_link() {
        println!();
        println!("AI analysis: {}", style(link).cyan());
    }
    Ok(())
}

fn print_summary(session: &ScreeningSession) {
    let date = session.data_date().unwrap_or("-");
    match session.status() {
        QueryStatus::Loaded { count } => println!(
            "{} {} 件ヒット (データ日付: {}, 条件 {} 件)",
            style("✓").green().bold(),
            count,
            date,
            session.filters().active_count()
        ),
        QueryStatus::Empty => println!(
            "{} 0 件 (条件 {} 件)",
            style("-").dim(),
            session.filters().active_count()
        ),
        other => println!("{:?}", other),
    }
    println!();
}

fn print_table(headers: &[String], table: &RenderedTable) {
    let mut widths: Vec<usize> = headers
        .iter()
        .map(|h| console::measure_text_width(h))
        .collect();
    for row in table.stock_rows() {
        for (width, cell) in widths.iter_mut().zip(&row.cells) {
            *width = (*width).max(console::measure_text_width(cell));
        }
    }

    let header_line: Vec<String> = headers
        .iter()
        .zip(&widths)
        .map(|(h, w)| pad_str(h, *w, Alignment::Left, None).into_owned())
        .collect();
    println!("{}", style(header_line.join("  ")).bold());

    let change_column = table
        .columns
        .iter()
        .position(|c| *c == StockField::ChangePercent);
    for row in &table.rows {
        match row {
            TableRow::NoMatches { message } => println!("{}", style(message).dim()),
            TableRow::Stock(stock) => {
                let cells: Vec<String> = stock
                    .cells
                    .iter()
                    .zip(&widths)
                    .enumerate()
                    .map(|(i, (cell, w))| {
                        let padded = pad_str(cell, *w, Alignment::Left, None).into_owned();
                        if Some(i) != change_column {
                            return padded;
                        }
                        match stock.change_class {
                            ChangeClass::Positive => style(padded).green().to_string(),
                            ChangeClass::Negative => style(padded).red().to_string(),
                            ChangeClass::Neutral => padded,
                        }
                    })
                    .collect();

                if stock.patterns.is_empty() {
                    println!("{}", cells.join("  "));
                } else {
                    println!("{}  {}", cells.join("  "), style(stock.patterns.join(" ")).yellow());
                }
            }
        }
    }
}

fn print_criteria() {
    let model = FilterModel::new();
    for criterion in model.criteria() {
        let unit = criterion
            .conversion
            .map(|c| format!(" [{}]", c.input_unit()))
            .unwrap_or_default();
        println!(
            "{:<36} {:<14} {}{}",
            criterion.key,
            format!("{:?}", criterion.kind),
            criterion.label,
            unit
        );
    }
}

fn run_snapshot(config: &Config, json: bool, clear: bool) -> Result<()> {
    let store = open_store(config)?;

    if clear {
        store.clear()?;
        println!("Snapshot cleared");
        return Ok(());
    }

    let Some(snapshot) = store.load()? else {
        println!("No snapshot captured yet");
        return Ok(());
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&snapshot)?);
        return Ok(());
    }

    println!("Analysis Snapshot");
    println!("=================");
    println!("Captured:  {}", snapshot.captured_at.to_rfc3339());
    println!("Records:   {}", snapshot.len());
    for record in snapshot.records.iter().take(20) {
        println!(
            "  {:<8} {}",
            record.code.as_deref().unwrap_or("-"),
            record.name.as_deref().unwrap_or("-")
        );
    }
    if snapshot.len() > 20 {
        println!("  ... and {} more", snapshot.len() - 20);
    }
    Ok(())
}

fn run_chart(config: &Config, code: &str) -> Result<()> {
    let store = open_store(config)?;
    let snapshot = store
        .load()?
        .context("No snapshot captured yet; run `kabu-screener screen` first")?;

    if !snapshot
        .records
        .iter()
        .any(|r| r.code.as_deref() == Some(code))
    {
        bail!("{} is not in the last screening result", code);
    }

    let navigator = Navigator::new(&config.screener.base_url)?;
    println!("{}", navigator.chart_url(code));
    Ok(())
}
