//! Poll Records
//!
//! Rows as they come out of the store, and the aggregated results view.

use serde::{Deserialize, Serialize};

/// Poll identifier (UUID v4, hyphenated)
pub type PollId = String;

/// Option identifier assigned by the store
pub type OptionId = i64;

/// Stored poll
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Poll {
    pub id: PollId,
    pub question: String,
}

/// Stored poll option
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PollOption {
    pub id: OptionId,
    pub poll_id: PollId,
    pub option_text: String,
}

/// Public view of a vote. The voter address is deliberately absent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteRecord {
    pub poll_option_id: OptionId,
    pub voter_name: String,
}

/// Vote about to be inserted
#[derive(Debug, Clone)]
pub struct NewVote {
    pub poll_id: PollId,
    pub option_id: OptionId,
    /// Canonical textual IP address of the voter
    pub voter_ip: String,
    pub voter_name: String,
}

/// Option together with the votes cast for it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OptionResults {
    #[serde(flatten)]
    pub option: PollOption,
    pub votes: Vec<VoteRecord>,
}

impl OptionResults {
    pub fn vote_count(&self) -> usize {
        self.votes.len()
    }
}

/// Tally for one poll, always computed fresh from the store
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PollResults {
    pub poll: Poll,
    pub options: Vec<OptionResults>,
    pub total_votes: usize,
}

impl PollResults {
    /// Group `votes` under their options. Votes pointing at an option not in
    /// `options` are dropped and do not count towards the total.
    pub fn tally(poll: Poll, options: Vec<PollOption>, votes: Vec<VoteRecord>) -> Self {
        let mut options: Vec<OptionResults> = options
            .into_iter()
            .map(|option| OptionResults {
                option,
                votes: Vec::new(),
            })
            .collect();

        let mut total_votes = 0;
        for vote in votes {
            if let Some(slot) = options
                .iter_mut()
                .find(|o| o.option.id == vote.poll_option_id)
            {
                slot.votes.push(vote);
                total_votes += 1;
            }
        }

        Self {
            poll,
            options,
            total_votes,
        }
    }

    /// Look up an option's results by its text
    pub fn option_by_text(&self, text: &str) -> Option<&OptionResults> {
        self.options.iter().find(|o| o.option.option_text == text)
    }
}
