// ********* Persisted data structures ***********

use std::collections::{BTreeMap, BTreeSet};
use std::fmt::Display;

use chrono::{Local, NaiveDate};
use serde::{Deserialize, Serialize};
use snafu::prelude::*;

/// The version written in every snapshot document.
pub const SNAPSHOT_VERSION: u32 = 1;

/// The participants of the team, kept sorted by name.
pub type Roster = BTreeSet<String>;

/// The nominations received by each member of a poll.
///
/// The keys are frozen when the poll opens. The records of a key are kept in submission order.
pub type Ledger = BTreeMap<String, Vec<NominationRecord>>;

/// The calendar day a poll covers, written `YYYY-MM-DD`.
#[derive(Eq, PartialEq, Ord, PartialOrd, Debug, Clone, Copy, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct DayKey(NaiveDate);

impl DayKey {
    const FORMAT: &'static str = "%Y-%m-%d";

    /// The local calendar day.
    pub fn today() -> DayKey {
        DayKey(Local::now().date_naive())
    }

    pub fn from_date(date: NaiveDate) -> DayKey {
        DayKey(date)
    }

    pub fn parse(s: &str) -> PollResult<DayKey> {
        NaiveDate::parse_from_str(s.trim(), DayKey::FORMAT)
            .ok()
            .map(DayKey)
            .context(MalformedInputSnafu {
                reason: format!("{:?} is not a day of the form YYYY-MM-DD", s),
            })
    }

    pub fn date(&self) -> NaiveDate {
        self.0
    }
}

impl Display for DayKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.format(DayKey::FORMAT))
    }
}

impl TryFrom<String> for DayKey {
    type Error = PollError;
    fn try_from(s: String) -> PollResult<DayKey> {
        DayKey::parse(&s)
    }
}

impl From<DayKey> for String {
    fn from(day: DayKey) -> String {
        day.to_string()
    }
}

/// One vote for one nominee.
#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NominationRecord {
    pub nominator: String,
    pub feedback: Option<String>,
    #[serde(rename = "isAnonymous")]
    pub is_anonymous: bool,
}

/// The poll of one day.
///
/// The default value is the state of a day that was never touched, and also what a reset
/// brings a poll back to.
#[derive(Eq, PartialEq, Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Poll {
    pub name: String,
    #[serde(rename = "isOpen")]
    pub is_open: bool,
    #[serde(rename = "isClosed")]
    pub is_closed: bool,
    pub ledger: Ledger,
    /// The members that opted out of nominating in this poll.
    #[serde(default)]
    pub declined: BTreeSet<String>,
}

/// The lifecycle of a poll, derived from its fields.
#[derive(Eq, PartialEq, Debug, Clone, Copy, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PollState {
    /// Never referenced, or reset.
    NoPoll,
    /// Named by the host, not accepting nominations yet.
    Draft,
    /// Accepting nominations.
    Open,
    /// Terminal until reset. The results may be revealed.
    Closed,
}

impl Poll {
    pub fn state(&self) -> PollState {
        match (self.is_open, self.is_closed) {
            (true, true) => PollState::Closed,
            (true, false) => PollState::Open,
            _ if self.name.is_empty() => PollState::NoPoll,
            _ => PollState::Draft,
        }
    }
}

/// The unit of durable storage: everything the application knows.
#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Snapshot {
    pub version: u32,
    pub roster: Roster,
    #[serde(rename = "pollsByDay")]
    pub polls_by_day: BTreeMap<DayKey, Poll>,
}

impl Default for Snapshot {
    fn default() -> Self {
        Snapshot {
            version: SNAPSHOT_VERSION,
            roster: Roster::new(),
            polls_by_day: BTreeMap::new(),
        }
    }
}

impl Snapshot {
    /// The poll of the day, or the default poll if the day was never referenced.
    pub fn poll(&self, day: DayKey) -> Poll {
        self.polls_by_day.get(&day).cloned().unwrap_or_default()
    }

    pub(crate) fn poll_mut(&mut self, day: DayKey) -> &mut Poll {
        self.polls_by_day.entry(day).or_default()
    }
}

// ********* Rules **********

#[derive(Eq, PartialEq, Debug, Clone, Copy)]
pub struct PollRules {
    /// The maximum number of nominees in one submission.
    pub max_nominations: usize,
    /// Closes the poll as soon as no member is pending.
    pub auto_close: bool,
}

impl PollRules {
    pub const DEFAULT_RULES: PollRules = PollRules {
        max_nominations: 3,
        auto_close: false,
    };
}

impl Default for PollRules {
    fn default() -> Self {
        PollRules::DEFAULT_RULES
    }
}

// ********* Errors **********

/// Everything a command may fail with.
///
/// The validation errors are rejections: nothing was changed and the user may fix the input.
/// The persistence errors are failures of the storage layer.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum PollError {
    #[snafu(display("The poll of {day} is not open for nominations"))]
    PollNotOpen { day: DayKey },
    #[snafu(display("The poll of {day} is closed"))]
    PollClosed { day: DayKey },
    #[snafu(display("The poll of {day} needs a sprint name first"))]
    MissingSprintName { day: DayKey },
    #[snafu(display("{nominator} already took part in the poll of {day}"))]
    AlreadyNominated { day: DayKey, nominator: String },
    #[snafu(display("Invalid nominees: {reason}"))]
    InvalidNomineeSet { reason: String },
    #[snafu(display("Malformed input: {reason}"))]
    MalformedInput { reason: String },
    #[snafu(display("Cannot open the poll of {day}: the roster is empty"))]
    EmptyRosterOnOpen { day: DayKey },

    #[snafu(display("Could not write the snapshot to {path}"))]
    PersistenceWriteFailure {
        path: String,
        source: std::io::Error,
    },
    #[snafu(display("Could not read the snapshot from {path}"))]
    PersistenceRead {
        path: String,
        source: std::io::Error,
    },
    #[snafu(display("The snapshot at {path} is corrupt"))]
    PersistenceCorrupt {
        path: String,
        source: serde_json::Error,
    },
    #[snafu(display("The snapshot at {path} is locked by another process"))]
    StoreLocked { path: String },
}

impl PollError {
    /// True for the errors caused by the command itself, which left the state untouched.
    pub fn is_rejection(&self) -> bool {
        !matches!(
            self,
            PollError::PersistenceWriteFailure { .. }
                | PollError::PersistenceRead { .. }
                | PollError::PersistenceCorrupt { .. }
                | PollError::StoreLocked { .. }
        )
    }
}

pub type PollResult<T> = Result<T, PollError>;
