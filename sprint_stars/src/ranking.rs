// ******** Read models for the progress chart and the reveal *********

use log::debug;
use serde::Serialize;

use crate::config::*;

/// A nominee with at least one vote.
#[derive(Eq, PartialEq, Debug, Clone, Serialize)]
pub struct RankedEntry {
    pub name: String,
    #[serde(rename = "voteCount")]
    pub vote_count: usize,
}

/// A feedback message, attributed unless the nomination was anonymous.
#[derive(Eq, PartialEq, Debug, Clone, Serialize)]
pub struct FeedbackLine {
    pub text: String,
    #[serde(rename = "nominator")]
    pub attributed_nominator: Option<String>,
}

#[derive(Eq, PartialEq, Debug, Clone, Serialize)]
pub struct RevealEntry {
    pub rank: usize,
    pub name: String,
    #[serde(rename = "voteCount")]
    pub vote_count: usize,
    /// Shares the highest vote count.
    #[serde(rename = "isTopTied")]
    pub is_top_tied: bool,
    #[serde(rename = "feedbackLines")]
    pub feedback_lines: Vec<FeedbackLine>,
}

impl Poll {
    /// The nominees with votes, sorted by vote count.
    ///
    /// Highest first, ties in roster order, when `ascending` is false. The ascending order is the
    /// exact reverse, which draws the highest bar on top of a chart filled from the bottom.
    pub fn ranked_view(&self, ascending: bool) -> Vec<RankedEntry> {
        let mut entries: Vec<RankedEntry> = self
            .ledger
            .iter()
            .filter(|(_, records)| !records.is_empty())
            .map(|(name, records)| RankedEntry {
                name: name.clone(),
                vote_count: records.len(),
            })
            .collect();
        // The sort is stable: the ledger order breaks the ties.
        entries.sort_by(|a, b| b.vote_count.cmp(&a.vote_count));
        if ascending {
            entries.reverse();
        }
        entries
    }

    /// The labels of the progress chart, aligned with the ascending view.
    ///
    /// Before the reveal the names are replaced with `Star N` .. `Star 1`.
    pub fn progress_chart_labels(&self, reveal: bool) -> Vec<String> {
        let view = self.ranked_view(true);
        if reveal {
            return view.into_iter().map(|entry| entry.name).collect();
        }
        let n = view.len();
        (0..n).map(|idx| format!("Star {}", n - idx)).collect()
    }

    /// The ranked results with their feedback.
    ///
    /// This exposes the names of the nominees: callers must only show it once the poll is closed.
    pub fn reveal_details(&self) -> Vec<RevealEntry> {
        let view = self.ranked_view(false);
        let top_votes = view.first().map(|entry| entry.vote_count).unwrap_or(0);
        debug!(
            "reveal_details: {} nominees, top votes: {}",
            view.len(),
            top_votes
        );
        view.into_iter()
            .enumerate()
            .map(|(idx, entry)| {
                let feedback_lines = self
                    .ledger
                    .get(&entry.name)
                    .map(|records| feedback_lines(records))
                    .unwrap_or_default();
                RevealEntry {
                    rank: idx + 1,
                    is_top_tied: entry.vote_count == top_votes,
                    name: entry.name,
                    vote_count: entry.vote_count,
                    feedback_lines,
                }
            })
            .collect()
    }
}

fn feedback_lines(records: &[NominationRecord]) -> Vec<FeedbackLine> {
    records
        .iter()
        .filter_map(|record| {
            let text = record.feedback.as_deref().map(str::trim).unwrap_or("");
            if text.is_empty() {
                return None;
            }
            Some(FeedbackLine {
                text: text.to_string(),
                attributed_nominator: if record.is_anonymous {
                    None
                } else {
                    Some(record.nominator.clone())
                },
            })
        })
        .collect()
}
