use log::{debug, info};

use crate::config::*;

/// Trims the names and drops the empty and duplicated ones.
pub fn normalize_names<S: AsRef<str>>(names: &[S]) -> Roster {
    names
        .iter()
        .map(|s| s.as_ref().trim())
        .filter(|s| !s.is_empty())
        .map(|s| s.to_string())
        .collect()
}

impl Snapshot {
    /// The roster, in lexicographic order.
    pub fn roster_names(&self) -> Vec<String> {
        self.roster.iter().cloned().collect()
    }

    /// Replaces the whole roster. Returns false when nothing changed.
    ///
    /// An input without any usable name is ignored. Polls that are already open keep the
    /// members they were opened with.
    pub(crate) fn replace_roster<S: AsRef<str>>(&mut self, names: &[S]) -> bool {
        let roster = normalize_names(names);
        if roster.is_empty() {
            debug!("replace_roster: ignoring an input without names");
            return false;
        }
        if roster == self.roster {
            return false;
        }
        info!(
            "replace_roster: {} -> {} members",
            self.roster.len(),
            roster.len()
        );
        self.roster = roster;
        true
    }

    /// The members of the poll of the day.
    ///
    /// Once a poll is open they are the ledger keys, frozen at opening time.
    /// Before that they are the current roster.
    pub fn members(&self, day: DayKey) -> Vec<String> {
        match self.polls_by_day.get(&day) {
            Some(poll) if poll.is_open => poll.ledger.keys().cloned().collect(),
            _ => self.roster_names(),
        }
    }
}
