//! QueryGate - a safety gate for machine-generated SQL.

mod cli;

use std::process::ExitCode;
use std::sync::Arc;

use cli::Cli;
use querygate::config::{Config, StoreConfig};
use querygate::db::{self, QueryResult};
use querygate::error::{QueryGateError, Result};
use querygate::logging;
use querygate::query::{QueryExecutor, RunReport};
use querygate::safety::{SqlValidator, ValidationResult};
use tracing::{error, info};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse_args();

    match cli.log_path() {
        Some(path) => logging::init_file_logging(&path),
        None => logging::init_stderr_logging(),
    }

    match run(&cli).await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            error!("{}: {}", e.category(), e.message());
            eprintln!("{e}");
            ExitCode::FAILURE
        }
    }
}

/// Runs the requested action. Returns whether it succeeded.
async fn run(cli: &Cli) -> Result<bool> {
    let config_path = cli.config_path();
    info!("Loading config from: {}", config_path.display());
    let mut config = Config::load_from_file(&config_path)?;

    if let Some(timeout) = cli.timeout {
        if timeout == 0 {
            return Err(QueryGateError::config("--timeout must be greater than 0"));
        }
        config.executor.timeout_secs = timeout;
    }

    let sql = cli.sql.as_deref().unwrap_or_default();

    if cli.validate_only {
        let validation = SqlValidator::new().validate(sql);
        print_validation(&validation, cli.json)?;
        return Ok(validation.is_valid());
    }

    let store_config = resolve_store(cli, &config)?;
    info!("Store: {}", store_config.display_string());
    let store = db::open_store(&store_config)?;

    if cli.check {
        let healthy = store.health_check().await?;
        if healthy {
            println!("OK: {}", store_config.display_string());
        } else {
            println!("No tables found in {}", store_config.display_string());
        }
        return Ok(healthy);
    }

    let executor = QueryExecutor::from_config(Arc::new(store), &config.executor);
    let report = executor.run(sql).await;

    if cli.json {
        println!("{}", to_json(&report)?);
    } else {
        print_report(&report);
        let stats = executor.query_stats();
        println!(
            "\n{} executed, {} succeeded, {} failed ({} success)",
            stats.total, stats.successful, stats.failed, stats.success_rate
        );
    }

    Ok(report.is_success())
}

/// Resolves the store configuration with precedence:
/// 1. `--database` (highest)
/// 2. Config file
/// 3. `QUERYGATE_DATABASE`
fn resolve_store(cli: &Cli, config: &Config) -> Result<StoreConfig> {
    let mut store = config.store.clone();
    if let Some(from_cli) = cli.to_store_config()? {
        store.merge(&from_cli);
    }
    store.apply_env_defaults()?;

    if store.path.is_none() {
        return Err(QueryGateError::config(
            "No database configured. Use --database, a config file, or QUERYGATE_DATABASE",
        ));
    }
    Ok(store)
}

fn to_json<T: serde::Serialize>(value: &T) -> Result<String> {
    serde_json::to_string_pretty(value)
        .map_err(|e| QueryGateError::internal(format!("Failed to serialize output: {e}")))
}

fn print_validation(validation: &ValidationResult, json: bool) -> Result<()> {
    if json {
        println!("{}", to_json(validation)?);
        return Ok(());
    }

    if validation.is_valid() {
        println!("VALID: {}", validation.cleaned_text());
    } else {
        println!("REJECTED");
    }
    for error in validation.errors() {
        println!("  error: {error}");
    }
    for warning in validation.warnings() {
        println!("  warning: {warning}");
    }
    Ok(())
}

fn print_report(report: &RunReport) {
    for warning in report.metadata.validation.warnings() {
        eprintln!("warning: {warning}");
    }

    match &report.result {
        Some(result) => {
            print!("{}", render_table(result));
            let rows = report.outcome.rows_returned();
            let noun = if rows == 1 { "row" } else { "rows" };
            match report.metadata.execution_time_ms {
                Some(ms) => println!("({rows} {noun}, {ms} ms)"),
                None => println!("({rows} {noun})"),
            }
        }
        None => {
            println!(
                "Error: {}",
                report.outcome.error_message().unwrap_or("unknown error")
            );
            for error in &report.metadata.validation_errors {
                println!("  {error}");
            }
        }
    }
}

/// Renders a result set as a plain aligned text table.
fn render_table(result: &QueryResult) -> String {
    let headers = result.column_names();
    let cells: Vec<Vec<String>> = result
        .rows
        .iter()
        .map(|row| row.iter().map(|v| v.to_display_string()).collect())
        .collect();

    let mut widths: Vec<usize> = headers.iter().map(|h| h.chars().count()).collect();
    for row in &cells {
        for (i, cell) in row.iter().enumerate() {
            if let Some(width) = widths.get_mut(i) {
                *width = (*width).max(cell.chars().count());
            }
        }
    }

    let format_line = |values: &[String]| -> String {
        values
            .iter()
            .zip(&widths)
            .map(|(value, &width)| format!("{value:<width$}"))
            .collect::<Vec<_>>()
            .join(" | ")
            .trim_end()
            .to_string()
    };

    let mut out = String::new();
    out.push_str(&format_line(&headers));
    out.push('\n');
    out.push_str(
        &widths
            .iter()
            .map(|w| "-".repeat(*w))
            .collect::<Vec<_>>()
            .join("-+-"),
    );
    out.push('\n');
    for row in &cells {
        out.push_str(&format_line(row));
        out.push('\n');
    }
    out
}
