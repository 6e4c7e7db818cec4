pub use crate::config::*;

/// A builder for the nominations of one nominator.
///
/// The submission is only checked when it reaches the poll, so that the rejections follow the
/// same order whatever way the nominations were assembled.
///
/// ```
/// use sprint_stars::builder::Submission;
/// use sprint_stars::{DayKey, MemoryStore, PollRules, PollService};
/// # use sprint_stars::PollError;
///
/// let service = PollService::new(MemoryStore::new(), PollRules::DEFAULT_RULES)?;
/// let day = DayKey::parse("2026-10-19")?;
/// service.set_roster(&["Ava", "Rich", "Sam"])?;
/// service.set_sprint_name(day, "Sprint 42")?;
/// service.open_poll(day)?;
///
/// let submission = Submission::new("Ava")
///     .nominate("Rich", "Fixed the release pipeline")
///     .nominate_without_feedback("Sam")
///     .anonymous(true);
/// service.submit(day, &submission)?;
///
/// assert!(service.has_nominated(day, "Ava"));
/// # Ok::<(), PollError>(())
/// ```
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct Submission {
    pub(crate) nominator: String,
    pub(crate) nominees: Vec<String>,
    pub(crate) feedbacks: Vec<Option<String>>,
    pub(crate) is_anonymous: bool,
}

impl Submission {
    pub fn new(nominator: &str) -> Submission {
        Submission {
            nominator: nominator.to_string(),
            nominees: Vec::new(),
            feedbacks: Vec::new(),
            is_anonymous: false,
        }
    }

    /// Builds a submission from the raw fields of a form.
    ///
    /// Without any feedback, every nominee gets none. Otherwise the feedback entries are paired
    /// with the nominees in order, and an empty entry means no feedback.
    pub fn from_parts(
        nominator: &str,
        nominees: &[String],
        feedbacks: &[String],
        is_anonymous: bool,
    ) -> Submission {
        let feedbacks: Vec<Option<String>> = if feedbacks.is_empty() {
            vec![None; nominees.len()]
        } else {
            feedbacks
                .iter()
                .map(|s| if s.trim().is_empty() { None } else { Some(s.clone()) })
                .collect()
        };
        Submission {
            nominator: nominator.to_string(),
            nominees: nominees.to_vec(),
            feedbacks,
            is_anonymous,
        }
    }

    /// Adds a nominee with the reasons for the nomination.
    pub fn nominate(mut self, nominee: &str, feedback: &str) -> Submission {
        self.nominees.push(nominee.to_string());
        self.feedbacks.push(Some(feedback.to_string()));
        self
    }

    pub fn nominate_without_feedback(mut self, nominee: &str) -> Submission {
        self.nominees.push(nominee.to_string());
        self.feedbacks.push(None);
        self
    }

    /// Hides the name of the nominator next to the feedback.
    pub fn anonymous(mut self, is_anonymous: bool) -> Submission {
        self.is_anonymous = is_anonymous;
        self
    }

    pub fn nominator(&self) -> &str {
        &self.nominator
    }

    pub fn nominees(&self) -> &[String] {
        &self.nominees
    }

    pub fn feedbacks(&self) -> &[Option<String>] {
        &self.feedbacks
    }

    pub fn is_anonymous(&self) -> bool {
        self.is_anonymous
    }
}
