//! In-process poll store
//!
//! Keeps all three tables behind one mutex, so the duplicate check and the
//! insert of a vote happen in the same critical section.

use super::store::{PollStore, StoreError};
use super::types::{NewVote, OptionId, Poll, PollOption, VoteRecord};
use parking_lot::Mutex;
use std::collections::HashMap;

#[derive(Debug)]
struct StoredVote {
    poll_id: String,
    poll_option_id: OptionId,
    voter_ip: String,
    voter_name: String,
}

#[derive(Debug, Default)]
struct Tables {
    /// Polls by ID
    polls: HashMap<String, Poll>,
    /// Options in insertion order
    options: Vec<PollOption>,
    /// Votes in insertion order
    votes: Vec<StoredVote>,
    /// Track which addresses have voted in each poll (poll_id -> voter_ip -> vote index)
    voters: HashMap<String, HashMap<String, usize>>,
    next_option_id: OptionId,
}

/// Poll store that lives only as long as the process
#[derive(Debug, Default)]
pub struct MemoryPollStore {
    tables: Mutex<Tables>,
}

impl MemoryPollStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn public_vote(vote: &StoredVote) -> VoteRecord {
    VoteRecord {
        poll_option_id: vote.poll_option_id,
        voter_name: vote.voter_name.clone(),
    }
}

#[async_trait::async_trait]
impl PollStore for MemoryPollStore {
    async fn create_poll(
        &self,
        poll: &Poll,
        options: &[String],
    ) -> Result<Vec<PollOption>, StoreError> {
        let mut tables = self.tables.lock();
        if tables.polls.contains_key(&poll.id) {
            return Err(StoreError::PollExists(poll.id.clone()));
        }

        tables.polls.insert(poll.id.clone(), poll.clone());

        let mut stored = Vec::with_capacity(options.len());
        for text in options {
            tables.next_option_id += 1;
            let option = PollOption {
                id: tables.next_option_id,
                poll_id: poll.id.clone(),
                option_text: text.clone(),
            };
            tables.options.push(option.clone());
            stored.push(option);
        }

        Ok(stored)
    }

    async fn get_poll(&self, poll_id: &str) -> Result<Option<Poll>, StoreError> {
        Ok(self.tables.lock().polls.get(poll_id).cloned())
    }

    async fn options_for_poll(&self, poll_id: &str) -> Result<Vec<PollOption>, StoreError> {
        let tables = self.tables.lock();
        Ok(tables
            .options
            .iter()
            .filter(|o| o.poll_id == poll_id)
            .cloned()
            .collect())
    }

    async fn votes_for_poll(&self, poll_id: &str) -> Result<Vec<VoteRecord>, StoreError> {
        let tables = self.tables.lock();
        Ok(tables
            .votes
            .iter()
            .filter(|v| v.poll_id == poll_id)
            .map(public_vote)
            .collect())
    }

    async fn find_vote(
        &self,
        poll_id: &str,
        voter_ip: &str,
    ) -> Result<Option<VoteRecord>, StoreError> {
        let tables = self.tables.lock();
        let index = tables
            .voters
            .get(poll_id)
            .and_then(|m| m.get(voter_ip))
            .copied();
        Ok(index.map(|i| public_vote(&tables.votes[i])))
    }

    async fn insert_vote(&self, vote: &NewVote) -> Result<(), StoreError> {
        let mut tables = self.tables.lock();

        let belongs = tables
            .options
            .iter()
            .any(|o| o.id == vote.option_id && o.poll_id == vote.poll_id);
        if !belongs {
            return Err(StoreError::OptionNotInPoll(vote.option_id));
        }

        let already = tables
            .voters
            .get(&vote.poll_id)
            .map(|m| m.contains_key(&vote.voter_ip))
            .unwrap_or(false);
        if already {
            return Err(StoreError::DuplicateVote);
        }

        let index = tables.votes.len();
        tables.votes.push(StoredVote {
            poll_id: vote.poll_id.clone(),
            poll_option_id: vote.option_id,
            voter_ip: vote.voter_ip.clone(),
            voter_name: vote.voter_name.clone(),
        });
        tables
            .voters
            .entry(vote.poll_id.clone())
            .or_default()
            .insert(vote.voter_ip.clone(), index);

        Ok(())
    }
}
