// The transitions of a poll between its states.
//
// NO_POLL --name--> DRAFT --open--> OPEN --close--> CLOSED
//    ^                                                |
//    +--------------------- reset --------------------+
//
// Every transition returns whether the snapshot changed, so that no-ops are not persisted.

use log::{debug, info};
use snafu::prelude::*;

use crate::config::*;

impl Snapshot {
    /// Names the poll of the day. The first name turns a missing poll into a draft.
    pub(crate) fn set_sprint_name(&mut self, day: DayKey, name: &str) -> PollResult<bool> {
        let current = self.poll(day);
        ensure!(current.state() != PollState::Closed, PollClosedSnafu { day });
        let name = name.trim();
        if name.is_empty() || current.name == name {
            debug!("set_sprint_name: {}: nothing to change", day);
            return Ok(false);
        }
        info!("set_sprint_name: {}: {:?} -> {:?}", day, current.name, name);
        self.poll_mut(day).name = name.to_string();
        Ok(true)
    }

    /// Opens a draft poll to nominations.
    ///
    /// The ledger gets one empty entry per current roster member. This happens once: opening a
    /// poll that is already open (or closed) keeps its nominations.
    pub(crate) fn open_poll(&mut self, day: DayKey) -> PollResult<bool> {
        match self.poll(day).state() {
            PollState::Open | PollState::Closed => {
                debug!("open_poll: {}: already open", day);
                Ok(false)
            }
            PollState::NoPoll => MissingSprintNameSnafu { day }.fail(),
            PollState::Draft => {
                ensure!(!self.roster.is_empty(), EmptyRosterOnOpenSnafu { day });
                let ledger: Ledger = self
                    .roster
                    .iter()
                    .map(|name| (name.clone(), Vec::new()))
                    .collect();
                info!("open_poll: {}: opening with {} members", day, ledger.len());
                let poll = self.poll_mut(day);
                poll.ledger = ledger;
                poll.declined.clear();
                poll.is_open = true;
                Ok(true)
            }
        }
    }

    /// Stops the nominations. Only an open poll can be closed.
    pub(crate) fn close_poll(&mut self, day: DayKey) -> PollResult<bool> {
        ensure!(
            self.poll(day).state() == PollState::Open,
            PollNotOpenSnafu { day }
        );
        info!("close_poll: {}", day);
        self.poll_mut(day).is_closed = true;
        Ok(true)
    }

    /// Brings the poll of the day back to its default values.
    pub(crate) fn reset_poll(&mut self, day: DayKey) -> bool {
        let removed = self.polls_by_day.remove(&day);
        info!("reset_poll: {}: had poll: {}", day, removed.is_some());
        removed.is_some()
    }
}
