use std::io::IsTerminal;
use std::time::Duration;

use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use fakebus_mux::{ReaderOutcome, ShutdownCause, ShutdownReport};
use serde::Serialize;

#[derive(Clone, Debug, Copy, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Pretty,
}

impl OutputFormat {
    pub fn default_for_stdout() -> Self {
        if std::io::stdout().is_terminal() {
            Self::Table
        } else {
            Self::Json
        }
    }
}

/// What `run` prints once every endpoint exists.
#[derive(Debug, Serialize)]
pub struct StartupSummary<'a> {
    pub event: &'static str,
    pub target_device: &'a str,
    pub baud: u32,
    pub prefix: &'a str,
    pub client_count: usize,
    pub endpoints: &'a [String],
    pub failure_policy: &'static str,
}

#[derive(Debug, Serialize)]
struct ReaderOutput {
    reader: String,
    outcome: &'static str,
    frames: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

#[derive(Debug, Serialize)]
struct ShutdownOutput {
    event: &'static str,
    cause: String,
    uptime_ms: u128,
    readers: Vec<ReaderOutput>,
    detached: Vec<String>,
    deprovisioned: Vec<String>,
    deprovision_failures: Vec<String>,
}

pub fn print_startup(summary: &StartupSummary<'_>, format: OutputFormat) {
    match format {
        OutputFormat::Json => print_json(summary),
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["TARGET", "BAUD", "POLICY", "ENDPOINT"]);
            for name in summary.endpoints {
                table.add_row(vec![
                    summary.target_device.to_string(),
                    summary.baud.to_string(),
                    summary.failure_policy.to_string(),
                    name.clone(),
                ]);
            }
            println!("{table}");
        }
        OutputFormat::Pretty => {
            println!(
                "Multiplexing {} @ {} baud to {} endpoint(s) named {}N:",
                summary.target_device, summary.baud, summary.client_count, summary.prefix
            );
            for name in summary.endpoints {
                println!("  {name}");
            }
        }
    }
}

pub fn print_shutdown(report: &ShutdownReport, format: OutputFormat) {
    let out = shutdown_output(report);
    match format {
        OutputFormat::Json => print_json(&out),
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["READER", "OUTCOME", "FRAMES", "ERROR"]);
            for reader in &out.readers {
                table.add_row(vec![
                    reader.reader.clone(),
                    reader.outcome.to_string(),
                    reader.frames.to_string(),
                    reader.error.clone().unwrap_or_default(),
                ]);
            }
            for reader in &out.detached {
                table.add_row(vec![reader.clone(), "detached".into(), "-".into(), String::new()]);
            }
            println!("shutdown: {} after {}", out.cause, format_uptime(report.uptime));
            println!("{table}");
            print_cleanup(&out);
        }
        OutputFormat::Pretty => {
            println!("shutdown: {} after {}", out.cause, format_uptime(report.uptime));
            for reader in &out.readers {
                match &reader.error {
                    Some(error) => println!(
                        "  {}: {} after {} frame(s): {error}",
                        reader.reader, reader.outcome, reader.frames
                    ),
                    None => println!(
                        "  {}: {} after {} frame(s)",
                        reader.reader, reader.outcome, reader.frames
                    ),
                }
            }
            for reader in &out.detached {
                println!("  {reader}: detached");
            }
            print_cleanup(&out);
        }
    }
}

fn print_cleanup(out: &ShutdownOutput) {
    for name in &out.deprovisioned {
        println!("removed {name}");
    }
    for failure in &out.deprovision_failures {
        println!("could not remove {failure}");
    }
}

fn shutdown_output(report: &ShutdownReport) -> ShutdownOutput {
    ShutdownOutput {
        event: "shutdown",
        cause: cause_label(report.cause),
        uptime_ms: report.uptime.as_millis(),
        readers: report
            .readers
            .iter()
            .map(|r| {
                let (outcome, error) = match &r.outcome {
                    ReaderOutcome::Cancelled => ("cancelled", None),
                    ReaderOutcome::Failed(err) => ("failed", Some(err.to_string())),
                };
                ReaderOutput {
                    reader: r.reader.to_string(),
                    outcome,
                    frames: r.frames,
                    error,
                }
            })
            .collect(),
        detached: report.detached.iter().map(ToString::to_string).collect(),
        deprovisioned: report.deprovisioned.clone(),
        deprovision_failures: report
            .deprovision_failures
            .iter()
            .map(|(name, err)| format!("{name}: {err}"))
            .collect(),
    }
}

pub fn cause_label(cause: ShutdownCause) -> String {
    match cause {
        ShutdownCause::ReaderFailed(reader) => format!("{reader} failed"),
        ShutdownCause::NoLiveEndpoints => "no live endpoints".to_string(),
        ShutdownCause::Requested => "requested".to_string(),
    }
}

fn format_uptime(uptime: Duration) -> String {
    format!("{:.1}s", uptime.as_secs_f64())
}

fn print_json<T: Serialize>(value: &T) {
    println!(
        "{}",
        serde_json::to_string(value).unwrap_or_else(|_| "{}".to_string())
    );
}
