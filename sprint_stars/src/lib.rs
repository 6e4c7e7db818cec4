pub mod builder;
mod config;
mod ledger;
mod lifecycle;
pub mod manual;
mod ranking;
mod roster;
pub mod store;

use log::{debug, error, info, warn};
use serde::Serialize;

use std::{
    collections::BTreeSet,
    sync::atomic::{AtomicBool, Ordering},
    sync::{Mutex, PoisonError, RwLock, RwLockReadGuard},
};

pub use crate::builder::Submission;
pub use crate::config::*;
pub use crate::ledger::Progress;
pub use crate::ranking::{FeedbackLine, RankedEntry, RevealEntry};
pub use crate::roster::normalize_names;
pub use crate::store::{JsonFileStore, MemoryStore, SnapshotStore, StoreLock};

/// The state of the poll of one day, as shown to the host.
#[derive(Eq, PartialEq, Debug, Clone, Serialize)]
pub struct PollStatus {
    pub day: DayKey,
    pub name: String,
    pub state: PollState,
    #[serde(rename = "isOpen")]
    pub is_open: bool,
    #[serde(rename = "isClosed")]
    pub is_closed: bool,
    pub members: Vec<String>,
}

/// The boundary through which every command reaches the snapshot.
///
/// A mutating command holds the writer lock (and the lock of the store) while it reloads the
/// snapshot, validates the command against it, applies it and stores the result. The cached
/// snapshot is only replaced once the store accepted the write.
///
/// Queries read the cached snapshot without taking the writer lock. They may be one write
/// behind another process, until the next command or [`PollService::refresh`].
pub struct PollService<S: SnapshotStore> {
    store: S,
    rules: PollRules,
    writer: Mutex<()>,
    snapshot: RwLock<Snapshot>,
    // Set when the cache replaced an unreadable stored snapshot with an empty one.
    started_over: AtomicBool,
}

/// Reads the stored snapshot, starting from an empty one when there is none.
///
/// A corrupt snapshot is also replaced by an empty one, which is flagged by the returned
/// boolean. This discards the previous data, so it is reported at the error level.
fn load_or_default<S: SnapshotStore>(store: &S) -> PollResult<(Snapshot, bool)> {
    match store.load() {
        Ok(Some(snapshot)) => Ok((snapshot, false)),
        Ok(None) => {
            debug!("load_or_default: nothing stored yet");
            Ok((Snapshot::default(), false))
        }
        Err(e @ PollError::PersistenceCorrupt { .. }) => {
            error!(
                "{} ({:?}). Starting from an empty snapshot: the previous polls and roster are NOT loaded.",
                e, e
            );
            Ok((Snapshot::default(), true))
        }
        Err(e) => Err(e),
    }
}

impl<S: SnapshotStore> PollService<S> {
    pub fn new(store: S, rules: PollRules) -> PollResult<PollService<S>> {
        let (snapshot, started_over) = load_or_default(&store)?;
        info!(
            "PollService: {} members, {} polls, rules: {:?}",
            snapshot.roster.len(),
            snapshot.polls_by_day.len(),
            rules
        );
        Ok(PollService {
            store,
            rules,
            writer: Mutex::new(()),
            snapshot: RwLock::new(snapshot),
            started_over: AtomicBool::new(started_over),
        })
    }

    pub fn rules(&self) -> &PollRules {
        &self.rules
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// A copy of the last loaded snapshot.
    pub fn snapshot(&self) -> Snapshot {
        self.read().clone()
    }

    /// Reloads the cached snapshot from the store.
    pub fn refresh(&self) -> PollResult<()> {
        let (fresh, started_over) = load_or_default(&self.store)?;
        self.started_over.store(started_over, Ordering::SeqCst);
        *self.snapshot.write().unwrap_or_else(PoisonError::into_inner) = fresh;
        Ok(())
    }

    fn read(&self) -> RwLockReadGuard<'_, Snapshot> {
        self.snapshot.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn replace_cache(&self, snapshot: Snapshot) {
        *self.snapshot.write().unwrap_or_else(PoisonError::into_inner) = snapshot;
    }

    // The read-modify-write cycle shared by all the mutating commands.
    // The command returns whether it changed the snapshot; unchanged snapshots are not written.
    // An unreadable stored snapshot is only overwritten once the cache has started over from it
    // (at creation or on refresh): the data still held in the cache would be lost otherwise.
    fn commit<F>(&self, command: &str, apply: F) -> PollResult<bool>
    where
        F: FnOnce(&mut Snapshot) -> PollResult<bool>,
    {
        let _writer = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
        let _lock = self.store.lock()?;
        let fresh = match self.store.load() {
            Ok(Some(snapshot)) => {
                self.started_over.store(false, Ordering::SeqCst);
                snapshot
            }
            Ok(None) => Snapshot::default(),
            Err(e @ PollError::PersistenceCorrupt { .. })
                if self.started_over.load(Ordering::SeqCst) =>
            {
                warn!("{}: replacing the unreadable snapshot: {}", command, e);
                Snapshot::default()
            }
            Err(e) => {
                error!("{}: the stored snapshot cannot be used: {}", command, e);
                return Err(e);
            }
        };
        let mut next = fresh.clone();
        match apply(&mut next) {
            Err(e) => {
                debug!("{}: rejected: {}", command, e);
                self.replace_cache(fresh);
                Err(e)
            }
            Ok(false) => {
                debug!("{}: nothing changed", command);
                self.replace_cache(fresh);
                Ok(false)
            }
            Ok(true) => {
                if let Err(e) = self.store.save(&next) {
                    warn!("{}: the snapshot could not be saved: {}", command, e);
                    self.replace_cache(fresh);
                    return Err(e);
                }
                debug!("{}: committed", command);
                self.started_over.store(false, Ordering::SeqCst);
                self.replace_cache(next);
                Ok(true)
            }
        }
    }

    // ********* Roster *********

    /// The roster in lexicographic order.
    pub fn get_roster(&self) -> Vec<String> {
        self.read().roster_names()
    }

    /// Replaces the roster. An input without any name is ignored.
    pub fn set_roster<N: AsRef<str>>(&self, names: &[N]) -> PollResult<bool> {
        self.commit("set_roster", |snapshot| Ok(snapshot.replace_roster(names)))
    }

    // ********* Lifecycle *********

    pub fn get_poll_state(&self, day: DayKey) -> PollStatus {
        let snapshot = self.read();
        let poll = snapshot.poll(day);
        PollStatus {
            day,
            state: poll.state(),
            name: poll.name,
            is_open: poll.is_open,
            is_closed: poll.is_closed,
            members: snapshot.members(day),
        }
    }

    pub fn set_sprint_name(&self, day: DayKey, name: &str) -> PollResult<bool> {
        self.commit("set_sprint_name", |snapshot| {
            snapshot.set_sprint_name(day, name)
        })
    }

    pub fn open_poll(&self, day: DayKey) -> PollResult<bool> {
        self.commit("open_poll", |snapshot| snapshot.open_poll(day))
    }

    pub fn close_poll(&self, day: DayKey) -> PollResult<bool> {
        self.commit("close_poll", |snapshot| snapshot.close_poll(day))
    }

    pub fn reset_poll(&self, day: DayKey) -> PollResult<bool> {
        self.commit("reset_poll", |snapshot| Ok(snapshot.reset_poll(day)))
    }

    // ********* Nominations *********

    /// Records the nominations of one nominator, all of them or none.
    pub fn submit_nomination(
        &self,
        day: DayKey,
        nominator: &str,
        nominees: &[String],
        feedbacks: &[Option<String>],
        is_anonymous: bool,
    ) -> PollResult<bool> {
        let rules = self.rules;
        self.commit("submit_nomination", |snapshot| {
            snapshot.submit_nomination(day, nominator, nominees, feedbacks, is_anonymous, &rules)?;
            if rules.auto_close {
                snapshot.close_if_complete(day)?;
            }
            Ok(true)
        })
    }

    pub fn submit(&self, day: DayKey, submission: &Submission) -> PollResult<bool> {
        self.submit_nomination(
            day,
            submission.nominator(),
            submission.nominees(),
            submission.feedbacks(),
            submission.is_anonymous(),
        )
    }

    /// Records that a member does not take part in the poll.
    pub fn decline_participation(&self, day: DayKey, name: &str) -> PollResult<bool> {
        let rules = self.rules;
        self.commit("decline_participation", |snapshot| {
            snapshot.decline_participation(day, name)?;
            if rules.auto_close {
                snapshot.close_if_complete(day)?;
            }
            Ok(true)
        })
    }

    pub fn has_nominated(&self, day: DayKey, name: &str) -> bool {
        self.read().poll(day).has_nominated(name.trim())
    }

    pub fn participants(&self, day: DayKey) -> BTreeSet<String> {
        self.read().poll(day).participants()
    }

    pub fn pending(&self, day: DayKey) -> BTreeSet<String> {
        self.read().pending(day)
    }

    pub fn progress(&self, day: DayKey) -> Progress {
        self.read().progress(day)
    }

    // ********* Results *********

    pub fn ranked_view(&self, day: DayKey, ascending: bool) -> Vec<RankedEntry> {
        self.read().poll(day).ranked_view(ascending)
    }

    pub fn progress_chart_labels(&self, day: DayKey, reveal: bool) -> Vec<String> {
        self.read().poll(day).progress_chart_labels(reveal)
    }

    /// The ranked results with the nominee names.
    ///
    /// Nothing prevents calling it on an open poll: the caller must not show the result to the
    /// team before the poll is closed.
    pub fn reveal_details(&self, day: DayKey) -> Vec<RevealEntry> {
        self.read().poll(day).reveal_details()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::fs;
    use std::io;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    fn day() -> DayKey {
        DayKey::parse("2026-10-19").unwrap()
    }

    fn names(ns: &[&str]) -> Vec<String> {
        ns.iter().map(|s| s.to_string()).collect()
    }

    fn open_service(roster: &[&str]) -> PollService<MemoryStore> {
        let _ = env_logger::builder().is_test(true).try_init();
        let service = PollService::new(MemoryStore::new(), PollRules::DEFAULT_RULES).unwrap();
        service.set_roster(roster).unwrap();
        service.set_sprint_name(day(), "Demo").unwrap();
        service.open_poll(day()).unwrap();
        service
    }

    /// A store whose writes can be made to fail.
    struct FlakyStore {
        inner: MemoryStore,
        failing: AtomicBool,
    }

    impl SnapshotStore for FlakyStore {
        fn load(&self) -> PollResult<Option<Snapshot>> {
            self.inner.load()
        }

        fn save(&self, snapshot: &Snapshot) -> PollResult<()> {
            if self.failing.load(Ordering::SeqCst) {
                return Err(PollError::PersistenceWriteFailure {
                    path: "flaky".to_string(),
                    source: io::Error::new(io::ErrorKind::Other, "disk full"),
                });
            }
            self.inner.save(snapshot)
        }
    }

    #[test]
    fn scenario_single_nomination() {
        let service = open_service(&["Ava", "Rich", "Sam"]);
        service
            .submit_nomination(
                day(),
                "Ava",
                &names(&["Rich"]),
                &[Some("Great work".to_string())],
                false,
            )
            .unwrap();
        service.close_poll(day()).unwrap();
        let details = service.reveal_details(day());
        assert_eq!(details.len(), 1);
        assert_eq!(details[0].rank, 1);
        assert_eq!(details[0].name, "Rich");
        assert_eq!(details[0].vote_count, 1);
        assert_eq!(
            details[0].feedback_lines,
            vec![FeedbackLine {
                text: "Great work".to_string(),
                attributed_nominator: Some("Ava".to_string()),
            }]
        );
    }

    #[test]
    fn scenario_two_nominators() {
        let service = open_service(&["Ava", "Rich", "Sam"]);
        service
            .submit(
                day(),
                &Submission::new("Ava")
                    .nominate_without_feedback("Rich")
                    .nominate_without_feedback("Sam"),
            )
            .unwrap();
        service
            .submit(day(), &Submission::new("Rich").nominate_without_feedback("Sam"))
            .unwrap();
        service.close_poll(day()).unwrap();
        let details = service.reveal_details(day());
        assert_eq!((details[0].name.as_str(), details[0].vote_count), ("Sam", 2));
        assert!(details[0].is_top_tied);
        assert_eq!((details[1].name.as_str(), details[1].vote_count), ("Rich", 1));
        assert_eq!(details[1].rank, 2);
    }

    #[test]
    fn scenario_self_nomination() {
        let service = open_service(&["Ava", "Rich", "Sam"]);
        let before = service.snapshot();
        let res = service.submit(day(), &Submission::new("Ava").nominate_without_feedback("Ava"));
        assert!(matches!(res, Err(PollError::InvalidNomineeSet { .. })));
        assert_eq!(service.snapshot(), before);
    }

    #[test]
    fn scenario_close_draft() {
        let service = PollService::new(MemoryStore::new(), PollRules::DEFAULT_RULES).unwrap();
        service.set_roster(&["Ava", "Rich", "Sam"]).unwrap();
        service.set_sprint_name(day(), "Demo").unwrap();
        assert!(matches!(
            service.close_poll(day()),
            Err(PollError::PollNotOpen { .. })
        ));
        let status = service.get_poll_state(day());
        assert_eq!(status.state, PollState::Draft);
        assert!(!status.is_closed);
    }

    #[test]
    fn status_lists_frozen_members() {
        let service = open_service(&["Ava", "Rich"]);
        service.set_roster(&["Ava", "Rich", "Sam"]).unwrap();
        let status = service.get_poll_state(day());
        assert_eq!(status.state, PollState::Open);
        assert_eq!(status.name, "Demo");
        assert_eq!(status.members, vec!["Ava", "Rich"]);
        assert_eq!(service.get_roster(), vec!["Ava", "Rich", "Sam"]);
        assert_eq!(
            service.pending(day()).into_iter().collect::<Vec<_>>(),
            vec!["Ava", "Rich"]
        );
    }

    #[test]
    fn reset_brings_back_defaults() {
        let service = open_service(&["Ava", "Rich"]);
        service
            .submit(day(), &Submission::new("Ava").nominate("Rich", "Thanks"))
            .unwrap();
        assert!(service.reset_poll(day()).unwrap());
        let status = service.get_poll_state(day());
        assert_eq!(status.state, PollState::NoPoll);
        assert_eq!(status.name, "");
        assert!(!service.has_nominated(day(), "Ava"));
        assert!(service.reveal_details(day()).is_empty());
    }

    #[test]
    fn auto_close_when_everyone_took_part() {
        let rules = PollRules {
            auto_close: true,
            ..PollRules::DEFAULT_RULES
        };
        let service = PollService::new(MemoryStore::new(), rules).unwrap();
        service.set_roster(&["Ava", "Rich", "Sam"]).unwrap();
        service.set_sprint_name(day(), "Demo").unwrap();
        service.open_poll(day()).unwrap();
        service
            .submit(day(), &Submission::new("Ava").nominate_without_feedback("Sam"))
            .unwrap();
        service.decline_participation(day(), "Rich").unwrap();
        assert_eq!(service.get_poll_state(day()).state, PollState::Open);
        service
            .submit(day(), &Submission::new("Sam").nominate_without_feedback("Ava"))
            .unwrap();
        assert_eq!(service.get_poll_state(day()).state, PollState::Closed);
        assert_eq!(service.progress(day()).declined, 1);
    }

    #[test]
    fn concurrent_nominators_all_land() {
        let roster: Vec<String> = (0..12).map(|i| format!("Member {:02}", i)).collect();
        let service = PollService::new(MemoryStore::new(), PollRules::DEFAULT_RULES).unwrap();
        service.set_roster(roster.as_slice()).unwrap();
        service.set_sprint_name(day(), "Demo").unwrap();
        service.open_poll(day()).unwrap();
        let service = Arc::new(service);

        let handles: Vec<_> = (0..roster.len())
            .map(|i| {
                let service = Arc::clone(&service);
                let nominator = roster[i].clone();
                let nominee = roster[(i + 1) % roster.len()].clone();
                thread::spawn(move || {
                    service.submit_nomination(day(), &nominator, &[nominee], &[None], false)
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap().unwrap();
        }
        assert_eq!(service.participants(day()).len(), roster.len());
        assert!(service.pending(day()).is_empty());
        assert!(service.progress(day()).full_house);
        // The stored snapshot has every nomination too.
        let stored = service.store().load().unwrap().unwrap();
        assert_eq!(stored.poll(day()).participants().len(), roster.len());
    }

    #[test]
    fn concurrent_resubmissions_land_once() {
        let service = Arc::new(open_service(&["Ava", "Rich", "Sam", "Lyman"]));
        let handles: Vec<_> = ["Rich", "Sam", "Lyman", "Rich", "Sam", "Lyman"]
            .iter()
            .map(|nominee| {
                let service = Arc::clone(&service);
                let nominee = nominee.to_string();
                thread::spawn(move || {
                    service.submit_nomination(day(), "Ava", &[nominee], &[None], false)
                })
            })
            .collect();
        let results: Vec<PollResult<bool>> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
        assert!(results
            .iter()
            .filter_map(|r| r.as_ref().err())
            .all(|e| matches!(e, PollError::AlreadyNominated { .. })));
        let votes: usize = service
            .ranked_view(day(), false)
            .iter()
            .map(|e| e.vote_count)
            .sum();
        assert_eq!(votes, 1);
    }

    #[test]
    fn failed_write_is_not_committed() {
        let store = FlakyStore {
            inner: MemoryStore::new(),
            failing: AtomicBool::new(false),
        };
        let service = PollService::new(store, PollRules::DEFAULT_RULES).unwrap();
        service.set_roster(&["Ava", "Rich"]).unwrap();
        service.set_sprint_name(day(), "Demo").unwrap();
        service.open_poll(day()).unwrap();

        service.store().failing.store(true, Ordering::SeqCst);
        let submission = Submission::new("Ava").nominate("Rich", "Thanks");
        let res = service.submit(day(), &submission);
        assert!(matches!(
            res,
            Err(PollError::PersistenceWriteFailure { .. })
        ));
        assert!(!res.unwrap_err().is_rejection());
        assert!(!service.has_nominated(day(), "Ava"));

        // The user can retry.
        service.store().failing.store(false, Ordering::SeqCst);
        service.submit(day(), &submission).unwrap();
        assert!(service.has_nominated(day(), "Ava"));
    }

    #[test]
    fn commands_see_writes_of_other_services() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stars.json");
        let first = PollService::new(JsonFileStore::new(&path), PollRules::DEFAULT_RULES).unwrap();
        let second = PollService::new(JsonFileStore::new(&path), PollRules::DEFAULT_RULES).unwrap();

        first.set_roster(&["Ava", "Rich", "Sam"]).unwrap();
        first.set_sprint_name(day(), "Demo").unwrap();
        first.open_poll(day()).unwrap();
        first
            .submit(day(), &Submission::new("Ava").nominate_without_feedback("Rich"))
            .unwrap();

        // The queries of the second service are behind until it refreshes or commits.
        assert!(!second.has_nominated(day(), "Ava"));
        second
            .submit(day(), &Submission::new("Rich").nominate_without_feedback("Sam"))
            .unwrap();
        assert!(second.has_nominated(day(), "Ava"));
        assert!(matches!(
            second.submit(day(), &Submission::new("Ava").nominate_without_feedback("Sam")),
            Err(PollError::AlreadyNominated { .. })
        ));

        first.refresh().unwrap();
        assert_eq!(first.participants(day()).len(), 2);
    }

    #[test]
    fn services_on_one_file_do_not_lose_updates() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stars.json");
        let roster: Vec<String> = (0..8).map(|i| format!("Member {}", i)).collect();
        let setup = PollService::new(JsonFileStore::new(&path), PollRules::DEFAULT_RULES).unwrap();
        setup.set_roster(roster.as_slice()).unwrap();
        setup.set_sprint_name(day(), "Demo").unwrap();
        setup.open_poll(day()).unwrap();

        let handles: Vec<_> = (0..roster.len())
            .map(|i| {
                let path = path.clone();
                let nominator = roster[i].clone();
                let nominee = roster[(i + 3) % roster.len()].clone();
                thread::spawn(move || -> PollResult<bool> {
                    // One service per thread, like separate processes sharing the file.
                    let service =
                        PollService::new(JsonFileStore::new(&path), PollRules::DEFAULT_RULES)?;
                    service.submit_nomination(day(), &nominator, &[nominee], &[None], false)
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap().unwrap();
        }
        setup.refresh().unwrap();
        assert!(setup.pending(day()).is_empty());
    }

    #[test]
    fn corrupt_store_starts_over() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stars.json");
        fs::write(&path, "{'roster': ['Ava']}").unwrap();
        let service = PollService::new(JsonFileStore::new(&path), PollRules::DEFAULT_RULES).unwrap();
        assert!(service.get_roster().is_empty());
        assert!(dir.path().join("stars.json.corrupt").exists());
        service.set_roster(&["Ava"]).unwrap();
        assert_eq!(service.get_roster(), vec!["Ava"]);
    }

    #[test]
    fn corruption_during_a_session_is_not_overwritten() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stars.json");
        let service = PollService::new(JsonFileStore::new(&path), PollRules::DEFAULT_RULES).unwrap();
        service.set_roster(&["Ava", "Rich"]).unwrap();
        service.set_sprint_name(day(), "Demo").unwrap();

        fs::write(&path, "{'roster': ['Ava']}").unwrap();
        assert!(matches!(
            service.set_roster(&["Sam"]),
            Err(PollError::PersistenceCorrupt { .. })
        ));
        assert!(matches!(
            service.reset_poll(day()),
            Err(PollError::PersistenceCorrupt { .. })
        ));
        assert_eq!(fs::read_to_string(&path).unwrap(), "{'roster': ['Ava']}");
        assert_eq!(service.get_roster(), vec!["Ava", "Rich"]);
        assert_eq!(service.get_poll_state(day()).name, "Demo");

        // Starting over is explicit.
        service.refresh().unwrap();
        assert!(service.get_roster().is_empty());
        service.set_roster(&["Sam"]).unwrap();
        assert_eq!(service.get_roster(), vec!["Sam"]);
    }

    #[test]
    fn lock_left_by_a_dead_process_does_not_block_commands() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stars.json");
        fs::write(dir.path().join("stars.json.lock"), "999999\n").unwrap();
        let store = JsonFileStore::new(&path).with_lock_timeout(Duration::from_millis(100));
        let service = PollService::new(store, PollRules::DEFAULT_RULES).unwrap();
        service.set_roster(&["Ava", "Rich"]).unwrap();
        service.set_roster(&["Ava", "Sam"]).unwrap();
        service.set_roster(&["Ava", "Rich"]).unwrap();
        assert_eq!(service.get_roster(), vec!["Ava", "Rich"]);
    }
}
