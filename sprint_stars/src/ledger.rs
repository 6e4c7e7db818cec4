use std::collections::{BTreeSet, HashSet};

use log::{debug, info};
use serde::Serialize;
use snafu::prelude::*;

use crate::config::*;

/// How many members took part in a poll so far.
#[derive(Eq, PartialEq, Debug, Clone, Serialize)]
pub struct Progress {
    pub participated: usize,
    pub declined: usize,
    pub total: usize,
    /// Every member nominated someone.
    #[serde(rename = "fullHouse")]
    pub full_house: bool,
}

impl Poll {
    /// True if the name appears as a nominator anywhere in the ledger.
    pub fn has_nominated(&self, name: &str) -> bool {
        self.ledger
            .values()
            .flatten()
            .any(|record| record.nominator == name)
    }

    /// The distinct nominators recorded in the ledger.
    pub fn participants(&self) -> BTreeSet<String> {
        self.ledger
            .values()
            .flatten()
            .map(|record| record.nominator.clone())
            .collect()
    }

    // Checks everything about the nominees. Returns the trimmed names.
    fn check_nominees(
        &self,
        nominator: &str,
        nominees: &[String],
        rules: &PollRules,
    ) -> PollResult<Vec<String>> {
        let names: Vec<String> = nominees.iter().map(|s| s.trim().to_string()).collect();
        ensure!(
            !names.is_empty(),
            InvalidNomineeSetSnafu {
                reason: "at least one nominee is required"
            }
        );
        ensure!(
            names.len() <= rules.max_nominations,
            InvalidNomineeSetSnafu {
                reason: format!(
                    "{} nominees given, at most {} are allowed",
                    names.len(),
                    rules.max_nominations
                )
            }
        );
        let mut seen: HashSet<&str> = HashSet::new();
        for name in names.iter() {
            ensure!(
                name != nominator,
                InvalidNomineeSetSnafu {
                    reason: format!("{} cannot nominate themselves", nominator)
                }
            );
            ensure!(
                self.ledger.contains_key(name),
                InvalidNomineeSetSnafu {
                    reason: format!("{:?} is not a member of this poll", name)
                }
            );
            ensure!(
                seen.insert(name.as_str()),
                InvalidNomineeSetSnafu {
                    reason: format!("{} is nominated more than once", name)
                }
            );
        }
        Ok(names)
    }
}

fn clean_feedback(feedback: &Option<String>) -> Option<String> {
    feedback
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| s.to_string())
}

impl Snapshot {
    /// Records the nominations of one nominator.
    ///
    /// Either every nominee receives a record or the ledger is left untouched.
    pub(crate) fn submit_nomination(
        &mut self,
        day: DayKey,
        nominator: &str,
        nominees: &[String],
        feedbacks: &[Option<String>],
        is_anonymous: bool,
        rules: &PollRules,
    ) -> PollResult<bool> {
        let nominator = nominator.trim();
        let poll = self.polls_by_day.get(&day).cloned().unwrap_or_default();
        ensure!(poll.state() == PollState::Open, PollNotOpenSnafu { day });
        ensure!(
            poll.ledger.contains_key(nominator),
            MalformedInputSnafu {
                reason: format!("{:?} is not a member of this poll", nominator)
            }
        );
        ensure!(
            !poll.has_nominated(nominator) && !poll.declined.contains(nominator),
            AlreadyNominatedSnafu { day, nominator }
        );
        let names = poll.check_nominees(nominator, nominees, rules)?;
        ensure!(
            feedbacks.len() == names.len(),
            MalformedInputSnafu {
                reason: format!(
                    "{} feedback entries for {} nominees",
                    feedbacks.len(),
                    names.len()
                )
            }
        );

        debug!(
            "submit_nomination: {}: {} -> {:?} anonymous: {}",
            day, nominator, names, is_anonymous
        );
        let ledger = &mut self.poll_mut(day).ledger;
        for (name, feedback) in names.iter().zip(feedbacks.iter()) {
            if let Some(records) = ledger.get_mut(name) {
                records.push(NominationRecord {
                    nominator: nominator.to_string(),
                    feedback: clean_feedback(feedback),
                    is_anonymous,
                });
            }
        }
        info!(
            "submit_nomination: {}: {} nominated {} member(s)",
            day,
            nominator,
            names.len()
        );
        Ok(true)
    }

    /// Marks a member as not taking part in the poll.
    pub(crate) fn decline_participation(&mut self, day: DayKey, name: &str) -> PollResult<bool> {
        let name = name.trim();
        let poll = self.polls_by_day.get(&day).cloned().unwrap_or_default();
        ensure!(poll.state() == PollState::Open, PollNotOpenSnafu { day });
        ensure!(
            poll.ledger.contains_key(name),
            MalformedInputSnafu {
                reason: format!("{:?} is not a member of this poll", name)
            }
        );
        ensure!(
            !poll.has_nominated(name) && !poll.declined.contains(name),
            AlreadyNominatedSnafu {
                day,
                nominator: name
            }
        );
        info!("decline_participation: {}: {}", day, name);
        self.poll_mut(day).declined.insert(name.to_string());
        Ok(true)
    }

    /// The members that neither nominated nor declined yet.
    pub fn pending(&self, day: DayKey) -> BTreeSet<String> {
        let poll = self.poll(day);
        let participants = poll.participants();
        self.members(day)
            .into_iter()
            .filter(|name| !participants.contains(name) && !poll.declined.contains(name))
            .collect()
    }

    pub fn progress(&self, day: DayKey) -> Progress {
        let poll = self.poll(day);
        let participated = poll.participants().len();
        let total = self.members(day).len();
        Progress {
            participated,
            declined: poll.declined.len(),
            total,
            full_house: total > 0 && participated == total,
        }
    }

    /// Closes an open poll once nobody is pending. Returns true if it closed the poll.
    pub(crate) fn close_if_complete(&mut self, day: DayKey) -> PollResult<bool> {
        if self.poll(day).state() == PollState::Open && self.pending(day).is_empty() {
            info!("close_if_complete: {}: everyone took part", day);
            return self.close_poll(day);
        }
        Ok(false)
    }
}
