//! Command-line interface
//!
//! Runs the full analysis flow locally (load, train, classify) or starts
//! the dashboard server.

use clap::{Parser, Subcommand};
use colored::*;
use std::io::Write as _;
use std::path::{Path, PathBuf};
use std::time::Instant;

use crate::data::Dataset;
use crate::quadrant;
use crate::training::{train_with_metrics, ModelKind};

// ─── Terminal styling ──────────────────────────────────────────────────────────

const PANEL_WIDTH: usize = 60; // columns between the panel borders

fn dim(s: &str) -> ColoredString {
    s.truecolor(108, 108, 108)
}

fn muted(s: &str) -> ColoredString {
    s.truecolor(148, 148, 148)
}

fn accent(s: &str) -> ColoredString {
    s.truecolor(86, 197, 184)
}

fn ok(s: &str) -> ColoredString {
    s.truecolor(104, 212, 124)
}

/// Visible width of a string once ANSI color codes are stripped
fn visible_width(s: &str) -> usize {
    let mut width = 0;
    let mut in_escape = false;
    for c in s.chars() {
        match (in_escape, c) {
            (true, 'm') => in_escape = false,
            (true, _) => {}
            (false, '\x1b') => in_escape = true,
            (false, _) => width += 1,
        }
    }
    width
}

enum PanelRow {
    Blank,
    Rule,
    Left(String),
    Center(String),
}

/// Render rows inside a rounded border
fn panel(rows: &[PanelRow]) {
    println!("  {}", dim(&format!("╭{}╮", "─".repeat(PANEL_WIDTH))));
    for row in rows {
        match row {
            PanelRow::Rule => {
                println!("  {}", dim(&format!("├{}┤", "─".repeat(PANEL_WIDTH))));
            }
            PanelRow::Blank => {
                println!("  {}{}{}", dim("│"), " ".repeat(PANEL_WIDTH), dim("│"));
            }
            PanelRow::Left(text) => {
                let pad = PANEL_WIDTH.saturating_sub(visible_width(text) + 2);
                println!("  {}  {}{}{}", dim("│"), text, " ".repeat(pad), dim("│"));
            }
            PanelRow::Center(text) => {
                let slack = PANEL_WIDTH.saturating_sub(visible_width(text));
                let left = slack / 2;
                println!(
                    "  {}{}{}{}{}",
                    dim("│"),
                    " ".repeat(left),
                    text,
                    " ".repeat(slack - left),
                    dim("│")
                );
            }
        }
    }
    println!("  {}", dim(&format!("╰{}╯", "─".repeat(PANEL_WIDTH))));
}

fn kv(key: &str, value: &str) -> String {
    format!("{} {}", muted(key), value.white())
}

fn step_start(msg: &str) {
    print!("  {} {} … ", accent("▸"), msg);
    let _ = std::io::stdout().flush();
}

fn step_done(detail: &str) {
    println!("{} {}", ok("ok"), dim(detail));
}

fn section(title: &str) {
    println!();
    println!("  {}", title.white().bold());
    println!("  {}", dim(&"─".repeat(title.len().max(42))));
}

fn wait_enter() {
    println!();
    println!("  {}", dim("enter to continue"));
    let mut input = String::new();
    let _ = std::io::stdin().read_line(&mut input);
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let head: String = s.chars().take(max - 1).collect();
        format!("{}…", head)
    }
}

// ─── Argument parsing ──────────────────────────────────────────────────────────

#[derive(Parser)]
#[command(name = "serplens")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "SEO search-performance analytics from Search Console exports")]
#[command(long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Train a model on an export and print the quadrant report
    Analyze {
        /// Search Console CSV export
        #[arg(short, long)]
        data: PathBuf,

        /// Model kind (RandomForest, LinearRegression, MLPRegressor); prompts when omitted
        #[arg(short, long)]
        model: Option<String>,

        /// Rows to show per quadrant
        #[arg(long, default_value = "5")]
        top: usize,
    },

    /// Show information about an export
    Info {
        /// Search Console CSV export
        #[arg(short, long)]
        data: PathBuf,
    },

    /// Start the dashboard server
    Serve {
        /// Server port
        #[arg(short, long, default_value = "8080")]
        port: u16,

        /// Server host
        #[arg(long, default_value = "127.0.0.1")]
        host: String,
    },
}

// ─── Subcommands ───────────────────────────────────────────────────────────────

fn prompt_model_kind() -> anyhow::Result<ModelKind> {
    use dialoguer::{theme::ColorfulTheme, Select};

    let items: Vec<&str> = ModelKind::ALL.iter().map(|k| k.as_str()).collect();
    let choice = Select::with_theme(&ColorfulTheme::default())
        .with_prompt("Choose a regression model")
        .items(&items)
        .default(0)
        .interact()?;
    Ok(ModelKind::ALL[choice])
}

pub fn cmd_analyze(data_path: &Path, model: Option<&str>, top: usize) -> anyhow::Result<()> {
    section("Analyze");

    step_start("Loading export");
    let timer = Instant::now();
    let dataset = Dataset::from_csv_path(data_path)?;
    step_done(&format!("{} rows in {:?}", dataset.len(), timer.elapsed()));

    let kind = match model {
        Some(tag) => tag.parse::<ModelKind>()?,
        None => prompt_model_kind()?,
    };

    step_start(&format!("Training {}", kind.as_str().cyan()));
    let timer = Instant::now();
    let (trained, metrics) = train_with_metrics(&dataset, kind)?;
    step_done(&format!("{:?}", timer.elapsed()));

    println!();
    println!(
        "  Mean Squared Error for {}: {}",
        kind,
        format!("{:.2}", metrics.mse).white().bold()
    );
    println!(
        "  {}",
        dim(&format!(
            "rmse {:.2}  ·  mae {:.2}  ·  r² {:.3}  ·  {} held-out rows",
            metrics.rmse, metrics.mae, metrics.r2, metrics.n_samples
        ))
    );

    step_start("Scoring rows");
    let predictions = trained.predict(&dataset.feature_matrix()?)?;
    let scored = dataset.with_predicted_clicks(&predictions)?;
    step_done(&format!("{} predictions", scored.len()));

    let report = quadrant::classify(&scored)?;

    section("Quadrants");
    println!("  {:<16} {}", muted("Mean CTR"), format!("{:.4}", report.mean_ctr).white());
    println!("  {:<16} {}", muted("Mean position"), format!("{:.2}", report.mean_position).white());

    for bucket in &report.buckets {
        println!();
        println!(
            "  {} {}",
            bucket.quadrant.to_string().white().bold(),
            muted(&format!("({} queries)", bucket.rows.len()))
        );
        println!("  {}", dim(bucket.commentary));

        for row in bucket.rows.iter().take(top) {
            println!(
                "    {:<32} {}",
                truncate(&row.query, 32),
                dim(&format!(
                    "ctr {:.3}  pos {:.1}  impressions {:.0}  clicks {:.0}  predicted {:.2}",
                    row.ctr,
                    row.position,
                    row.impressions,
                    row.clicks,
                    row.predicted_clicks.unwrap_or(0.0)
                ))
            );
        }
        if bucket.rows.len() > top {
            println!("    {}", dim(&format!("… and {} more", bucket.rows.len() - top)));
        }
    }

    println!();
    Ok(())
}

pub fn cmd_info(data_path: &Path) -> anyhow::Result<()> {
    section("Export Info");

    let dataset = Dataset::from_csv_path(data_path)?;
    let df = dataset.frame();

    let facts = [
        ("File", data_path.display().to_string()),
        ("Rows", df.height().to_string()),
        ("Columns", df.width().to_string()),
    ];
    for (label, value) in facts {
        println!("  {:<12} {}", muted(label), value);
    }
    println!();

    println!(
        "  {:<16} {:<12} {:>8}",
        muted("Column"),
        muted("Type"),
        muted("Unique")
    );
    println!("  {}", dim(&"─".repeat(40)));

    for col in df.get_columns() {
        println!(
            "  {:<16} {:<12} {:>8}",
            col.name(),
            muted(&format!("{:?}", col.dtype())),
            col.n_unique().unwrap_or(0)
        );
    }

    println!();
    Ok(())
}

// ─── Server banner ─────────────────────────────────────────────────────────────

pub async fn cmd_serve(host: &str, port: u16) -> anyhow::Result<()> {
    use crate::server::{run_server, ServerConfig};
    use PanelRow::{Blank, Center, Left, Rule};

    println!();
    panel(&[
        Blank,
        Center("serplens".white().bold().to_string()),
        Center(dim(&format!("v{}", env!("CARGO_PKG_VERSION"))).to_string()),
        Blank,
        Rule,
        Blank,
        Left(kv("API    ", &format!("http://{}:{}/api", host, port))),
        Left(kv("Health ", &format!("http://{}:{}/api/health", host, port))),
        Blank,
        Rule,
        Blank,
        Center(dim("ctrl+c to stop").to_string()),
        Blank,
    ]);
    println!();

    let config = ServerConfig::default().with_address(host.to_string(), port);
    run_server(config).await
}

// ─── Interactive menu ──────────────────────────────────────────────────────────

fn print_banner() {
    println!();
    println!();
    println!("       {}", "┏━┓┏━╸┏━┓┏━┓╻  ┏━╸┏┓╻┏━┓".truecolor(86, 197, 184));
    println!("       {}", "┗━┓┣╸ ┣┳┛┣━┛┃  ┣╸ ┃┗┫┗━┓".truecolor(70, 177, 168));
    println!("       {}", "┗━┛┗━╸╹┗╸╹  ┗━╸┗━╸╹ ╹┗━┛".truecolor(54, 157, 152));
    println!();
    println!(
        "       {}",
        dim(&format!(
            "SEO performance analytics  ·  v{}  ·  rust",
            env!("CARGO_PKG_VERSION")
        ))
    );
    println!();
}

fn show_help() {
    section("Commands");

    let cmds: &[(&str, &str)] = &[
        ("serplens", "Interactive launcher (default)"),
        ("serplens serve", "Start the dashboard server"),
        ("serplens serve -p 3000", "Serve on custom port"),
        ("serplens analyze -d export.csv", "Train and print the quadrant report"),
        ("serplens analyze -d export.csv -m LinearRegression", "Train a specific model"),
        ("serplens info -d export.csv", "Inspect an export"),
    ];

    for (cmd, desc) in cmds {
        println!("  {:<52} {}", cmd.white(), muted(desc));
    }

    section("Endpoints");

    let endpoints: &[(&str, &str)] = &[
        ("http://localhost:8080/api/auth/login", "Identity gate"),
        ("http://localhost:8080/api/data/upload", "CSV upload"),
        ("http://localhost:8080/api/train", "Model training"),
        ("http://localhost:8080/api/quadrants", "Quadrant report"),
        ("http://localhost:8080/api/health", "Health check"),
    ];

    for (url, desc) in endpoints {
        println!("  {:<52} {}", accent(url), muted(desc));
    }

    println!();
}

pub async fn cmd_interactive() -> anyhow::Result<()> {
    use dialoguer::{theme::ColorfulTheme, Select};

    print_banner();

    let theme = ColorfulTheme {
        active_item_prefix: dialoguer::console::style("  ▸".to_string()).for_stderr().cyan(),
        active_item_style: dialoguer::console::Style::new().for_stderr().white().bold(),
        inactive_item_prefix: dialoguer::console::style("   ".to_string()).for_stderr(),
        inactive_item_style: dialoguer::console::Style::new().for_stderr().color256(245),
        prompt_prefix: dialoguer::console::style("  ?".to_string()).for_stderr().color256(79),
        prompt_style: dialoguer::console::Style::new().for_stderr().white().bold(),
        ..ColorfulTheme::default()
    };

    loop {
        let items = &[
            "Start Server          rest api on :8080",
            "Help                  commands & endpoints",
            "Exit",
        ];

        println!();
        let sel = Select::with_theme(&theme)
            .with_prompt("What would you like to do")
            .items(items)
            .default(0)
            .interact_opt()?;

        match sel {
            Some(0) => {
                cmd_serve("127.0.0.1", 8080).await?;
                break;
            }
            Some(1) => {
                show_help();
                wait_enter();
            }
            Some(2) | None => {
                println!();
                println!("  {}", dim("goodbye"));
                println!();
                break;
            }
            _ => {}
        }
    }

    Ok(())
}
