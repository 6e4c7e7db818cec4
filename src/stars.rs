use log::{debug, info, warn};

use snafu::{prelude::*, Snafu};
use sprint_stars::*;

use std::fs;

use serde_json::json;
use serde_json::Value as JSValue;
use text_diff::print_diff;

use crate::args::{Args, Command};
use crate::stars::config_reader::*;
use crate::stars::io_common::split_names;
use crate::stars::io_roster::read_roster_file;

pub mod config_reader;
pub mod io_common;
pub mod io_roster;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum StarsError {
    #[snafu(display("{source}"), context(false))]
    Poll { source: PollError },

    #[snafu(display("Error opening file {path}"))]
    OpeningJson {
        source: std::io::Error,
        path: String,
    },
    #[snafu(display("Error parsing the JSON file {path}"))]
    ParsingJson {
        source: serde_json::Error,
        path: String,
    },
    #[snafu(display("Error writing JSON"))]
    WritingJson { source: serde_json::Error },
    #[snafu(display("Invalid configuration: {reason}"))]
    InvalidConfig { reason: String },

    #[snafu(display("Error opening file {path}"))]
    OpeningExcel {
        source: calamine::XlsxError,
        path: String,
    },
    #[snafu(display("The workbook {path} has no such worksheet"))]
    EmptyExcel { path: String },
    #[snafu(display("Error opening file {path}"))]
    CsvOpen { source: csv::Error, path: String },
    #[snafu(display("Error reading line {lineno} of {path}"))]
    CsvLineParse {
        source: csv::Error,
        path: String,
        lineno: usize,
    },
    #[snafu(display("Error opening file {path}"))]
    OpeningText {
        source: std::io::Error,
        path: String,
    },

    #[snafu(display("The poll of {day} is not closed: the results are not revealed yet"))]
    NotRevealed { day: DayKey },
    #[snafu(display("Unknown output format {format:?} (expected json or markdown)"))]
    UnknownFormat { format: String },

    #[snafu(whatever, display("{message}"))]
    Whatever {
        message: String,
        #[snafu(source(from(Box<dyn std::error::Error>, Some)))]
        source: Option<Box<dyn std::error::Error>>,
    },
}

pub type StarsResult<T> = Result<T, StarsError>;

impl StarsError {
    /// 1 when the command was rejected or could not run, 2 when the storage failed.
    pub fn exit_code(&self) -> i32 {
        match self {
            StarsError::Poll { source } if !source.is_rejection() => 2,
            _ => 1,
        }
    }
}

fn pretty(js: &JSValue) -> StarsResult<String> {
    serde_json::to_string_pretty(js).context(WritingJsonSnafu {})
}

fn status_js(service: &PollService<JsonFileStore>, day: DayKey, changed: bool) -> JSValue {
    json!({
        "changed": changed,
        "poll": service.get_poll_state(day),
    })
}

/// The bars of the progress chart, from the bottom to the top.
fn chart_js(service: &PollService<JsonFileStore>, day: DayKey) -> JSValue {
    let revealed = service.get_poll_state(day).state == PollState::Closed;
    let view = service.ranked_view(day, true);
    let labels = service.progress_chart_labels(day, revealed);
    let bars: Vec<JSValue> = labels
        .iter()
        .zip(view.iter())
        .map(|(label, entry)| json!({"label": label, "voteCount": entry.vote_count}))
        .collect();
    json!({
        "revealed": revealed,
        "progress": service.progress(day),
        "bars": bars,
    })
}

fn results_js(status: &PollStatus, details: &[RevealEntry]) -> JSValue {
    json!({
        "day": status.day,
        "sprint": status.name,
        "results": details,
    })
}

/// Renders the results the way they are read out at the end of the sprint review.
pub fn results_markdown(details: &[RevealEntry]) -> String {
    let mut lines: Vec<String> = Vec::new();
    for entry in details {
        let votes = if entry.vote_count > 1 { "votes" } else { "vote" };
        let star = if entry.is_top_tied { " ⭐" } else { "" };
        lines.push(format!(
            "### {}. {} ({} {}){}",
            entry.rank, entry.name, entry.vote_count, votes, star
        ));
        for line in entry.feedback_lines.iter() {
            match &line.attributed_nominator {
                Some(nominator) => lines.push(format!("- {} *-{}*", line.text, nominator)),
                None => lines.push(format!("- {}", line.text)),
            }
        }
    }
    lines.join("\n")
}

pub fn read_summary(path: &str) -> StarsResult<JSValue> {
    let contents = fs::read_to_string(path).context(OpeningJsonSnafu { path })?;
    let js: JSValue = serde_json::from_str(contents.as_str()).context(ParsingJsonSnafu { path })?;
    debug!("read_summary: {:?}", js);
    Ok(js)
}

fn check_reference(reference_path: &str, results: &JSValue) -> StarsResult<()> {
    let summary_ref = read_summary(reference_path)?;
    let pretty_js_summary_ref = pretty(&summary_ref)?;
    let pretty_js_results = pretty(results)?;
    if pretty_js_summary_ref != pretty_js_results {
        warn!("Found differences with the reference string");
        print_diff(
            pretty_js_summary_ref.as_str(),
            pretty_js_results.as_str(),
            "\n",
        );
        whatever!("Difference detected between the results and the reference summary")
    }
    Ok(())
}

fn open_service(args: &Args) -> StarsResult<PollService<JsonFileStore>> {
    let config = match args.config.as_deref() {
        Some(path) => read_config(path)?,
        None => StarsConfig::default(),
    };
    let rules = config.rules()?;
    let path = snapshot_path(args.data.as_deref(), &config, args.config.as_deref());
    info!("Using the snapshot {:?}", path);
    Ok(PollService::new(JsonFileStore::new(path), rules)?)
}

/// Runs one command and returns what should be printed.
pub fn run_command(args: &Args) -> StarsResult<String> {
    let day = match args.day.as_deref() {
        Some(s) => DayKey::parse(s)?,
        None => DayKey::today(),
    };
    let service = open_service(args)?;
    debug!("run_command: day: {} command: {:?}", day, args.command);

    let js = match &args.command {
        Command::Roster => json!({ "roster": service.get_roster() }),
        Command::SetRoster { names } => {
            let names = split_names(names.as_slice());
            let changed = service.set_roster(names.as_slice())?;
            json!({ "changed": changed, "roster": service.get_roster() })
        }
        Command::ImportRoster { path, worksheet } => {
            let names = read_roster_file(path, worksheet.as_deref())?;
            let changed = service.set_roster(names.as_slice())?;
            json!({ "changed": changed, "roster": service.get_roster() })
        }
        Command::Status => json!(service.get_poll_state(day)),
        Command::Name { name } => {
            let changed = service.set_sprint_name(day, name)?;
            status_js(&service, day, changed)
        }
        Command::Open => {
            let changed = service.open_poll(day)?;
            status_js(&service, day, changed)
        }
        Command::Close => {
            let changed = service.close_poll(day)?;
            status_js(&service, day, changed)
        }
        Command::Reset => {
            let changed = service.reset_poll(day)?;
            status_js(&service, day, changed)
        }
        Command::Nominate {
            nominator,
            nominees,
            feedbacks,
            anonymous,
        } => {
            let submission = Submission::from_parts(nominator, nominees, feedbacks, *anonymous);
            service.submit(day, &submission)?;
            json!({
                "recorded": true,
                "state": service.get_poll_state(day).state,
                "progress": service.progress(day),
            })
        }
        Command::Decline { name } => {
            service.decline_participation(day, name)?;
            json!({
                "recorded": true,
                "state": service.get_poll_state(day).state,
                "progress": service.progress(day),
            })
        }
        Command::Pending => json!({ "pending": service.pending(day) }),
        Command::HasNominated { name } => json!({
            "name": name,
            "hasNominated": service.has_nominated(day, name),
        }),
        Command::Progress => json!(service.progress(day)),
        Command::Chart => chart_js(&service, day),
        Command::Results { format, reference } => {
            let status = service.get_poll_state(day);
            ensure!(status.state == PollState::Closed, NotRevealedSnafu { day });
            let details = service.reveal_details(day);
            let results = results_js(&status, &details);
            if let Some(reference_path) = reference {
                check_reference(reference_path, &results)?;
            }
            match format.as_deref().unwrap_or("json") {
                "json" => results,
                "markdown" | "md" => return Ok(results_markdown(&details)),
                x => return UnknownFormatSnafu { format: x }.fail(),
            }
        }
    };
    pretty(&js)
}
