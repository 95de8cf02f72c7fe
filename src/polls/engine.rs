//! Poll Engine
//!
//! Handles poll creation, voting, and result calculation on top of a
//! [`PollStore`]. Store failures are mapped onto [`PollError`] here and
//! nowhere else.

use super::config::{validate_voter_name, NewPoll, PollLimits};
use super::error::PollError;
use super::store::{PollStore, StoreError};
use super::types::{NewVote, OptionId, Poll, PollId, PollResults};
use std::net::IpAddr;
use std::sync::Arc;

/// A vote as submitted by a client
#[derive(Debug, Clone)]
pub struct VoteRequest {
    pub poll_id: String,
    /// Raw option identifier from the request body
    pub option: Option<String>,
    /// Raw display name from the request body
    pub name: Option<String>,
    /// Peer address of the connection the vote arrived on
    pub voter: IpAddr,
}

/// Poll engine shared by all request handlers
#[derive(Clone)]
pub struct PollEngine {
    store: Arc<dyn PollStore>,
    limits: PollLimits,
}

impl std::fmt::Debug for PollEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PollEngine")
            .field("limits", &self.limits)
            .finish_non_exhaustive()
    }
}

impl PollEngine {
    /// Create a new poll engine over the given store
    pub fn new(store: Arc<dyn PollStore>, limits: PollLimits) -> Self {
        Self { store, limits }
    }

    pub fn limits(&self) -> &PollLimits {
        &self.limits
    }

    /// Create a poll from a raw question and a comma-separated option list.
    /// Returns the new poll's identifier.
    pub async fn create_poll(&self, question: &str, options: &str) -> Result<PollId, PollError> {
        let new_poll = NewPoll::parse(question, options, &self.limits)?;

        let poll = Poll {
            id: uuid::Uuid::new_v4().to_string(),
            question: new_poll.question,
        };

        let stored = self.store.create_poll(&poll, &new_poll.options).await?;
        tracing::info!(poll_id = %poll.id, options = stored.len(), "Poll created");

        Ok(poll.id)
    }

    /// Record a vote; at most one per voter address per poll
    pub async fn cast_vote(&self, request: VoteRequest) -> Result<(), PollError> {
        let voter_name = validate_voter_name(request.name.as_deref().unwrap_or(""), &self.limits)?;

        if self.store.get_poll(&request.poll_id).await?.is_none() {
            return Err(PollError::NotFound);
        }

        let voter_ip = canonical_ip(request.voter).to_string();

        // Fast path only; racing votes are settled by the store's constraint.
        if self
            .store
            .find_vote(&request.poll_id, &voter_ip)
            .await?
            .is_some()
        {
            tracing::warn!(poll_id = %request.poll_id, "Rejected repeat vote");
            return Err(PollError::DuplicateVote);
        }

        let option_id = parse_option_id(request.option.as_deref())?;

        let vote = NewVote {
            poll_id: request.poll_id,
            option_id,
            voter_ip,
            voter_name,
        };

        match self.store.insert_vote(&vote).await {
            Ok(()) => {
                tracing::info!(poll_id = %vote.poll_id, option_id, "Vote recorded");
                Ok(())
            }
            Err(StoreError::DuplicateVote) => {
                tracing::warn!(poll_id = %vote.poll_id, "Rejected repeat vote");
                Err(PollError::DuplicateVote)
            }
            Err(StoreError::OptionNotInPoll(_)) => Err(PollError::invalid(INVALID_OPTION)),
            Err(e) => Err(e.into()),
        }
    }

    /// Tally a poll fresh from the store
    pub async fn results(&self, poll_id: &str) -> Result<PollResults, PollError> {
        let poll = self
            .store
            .get_poll(poll_id)
            .await?
            .ok_or(PollError::NotFound)?;

        let options = self.store.options_for_poll(poll_id).await?;
        let votes = self.store.votes_for_poll(poll_id).await?;

        Ok(PollResults::tally(poll, options, votes))
    }
}

const INVALID_OPTION: &str = "Invalid option";

fn parse_option_id(raw: Option<&str>) -> Result<OptionId, PollError> {
    raw.map(str::trim)
        .and_then(|s| s.parse::<OptionId>().ok())
        .ok_or_else(|| PollError::invalid(INVALID_OPTION))
}

/// IPv4 clients reaching a dual-stack listener show up as `::ffff:a.b.c.d`;
/// fold those back so one client has one identity.
fn canonical_ip(ip: IpAddr) -> IpAddr {
    match ip {
        IpAddr::V6(v6) => v6
            .to_ipv4_mapped()
            .map(IpAddr::V4)
            .unwrap_or(IpAddr::V6(v6)),
        v4 => v4,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::polls::MemoryPollStore;
    use std::net::{Ipv4Addr, Ipv6Addr};

    fn engine() -> PollEngine {
        PollEngine::new(Arc::new(MemoryPollStore::new()), PollLimits::default())
    }

    fn ip(last: u8) -> IpAddr {
        IpAddr::V4(Ipv4Addr::new(192, 168, 0, last))
    }

    fn vote(poll_id: &str, option: OptionId, name: &str, voter: IpAddr) -> VoteRequest {
        VoteRequest {
            poll_id: poll_id.to_string(),
            option: Some(option.to_string()),
            name: Some(name.to_string()),
            voter,
        }
    }

    async fn option_id(engine: &PollEngine, poll_id: &str, text: &str) -> OptionId {
        let results = engine.results(poll_id).await.unwrap();
        results.option_by_text(text).unwrap().option.id
    }

    #[tokio::test]
    async fn test_best_color_scenario() {
        let engine = engine();
        let poll_id = engine.create_poll("Best color?", "Red, Green, Blue").await.unwrap();

        let results = engine.results(&poll_id).await.unwrap();
        assert_eq!(results.poll.question, "Best color?");
        let texts: Vec<_> = results
            .options
            .iter()
            .map(|o| o.option.option_text.as_str())
            .collect();
        assert_eq!(texts, vec!["Red", "Green", "Blue"]);
        assert!(results.options.iter().all(|o| o.votes.is_empty()));
        assert_eq!(results.total_votes, 0);

        let red = option_id(&engine, &poll_id, "Red").await;
        let green = option_id(&engine, &poll_id, "Green").await;

        engine.cast_vote(vote(&poll_id, green, "A", ip(1))).await.unwrap();
        let results = engine.results(&poll_id).await.unwrap();
        assert_eq!(results.total_votes, 1);
        assert_eq!(results.option_by_text("Green").unwrap().vote_count(), 1);

        let again = engine.cast_vote(vote(&poll_id, red, "A", ip(1))).await;
        assert!(matches!(again, Err(PollError::DuplicateVote)));
        assert_eq!(engine.results(&poll_id).await.unwrap().total_votes, 1);

        engine.cast_vote(vote(&poll_id, red, "B", ip(2))).await.unwrap();
        let results = engine.results(&poll_id).await.unwrap();
        assert_eq!(results.total_votes, 2);
        assert_eq!(results.option_by_text("Red").unwrap().vote_count(), 1);
        assert_eq!(results.option_by_text("Green").unwrap().vote_count(), 1);
        assert_eq!(results.option_by_text("Blue").unwrap().vote_count(), 0);
        assert_eq!(results.option_by_text("Red").unwrap().votes[0].voter_name, "B");
    }

    #[tokio::test]
    async fn test_single_option_is_invalid() {
        let engine = engine();
        let result = engine.create_poll("Q", "OnlyOne").await;
        assert!(matches!(result, Err(PollError::InvalidInput(_))));
    }

    #[tokio::test]
    async fn test_empty_question_is_invalid() {
        let engine = engine();
        assert!(matches!(
            engine.create_poll("", "a, b").await,
            Err(PollError::InvalidInput(_))
        ));
    }

    #[tokio::test]
    async fn test_poll_ids_are_unique() {
        let engine = engine();
        let a = engine.create_poll("Q", "a, b").await.unwrap();
        let b = engine.create_poll("Q", "a, b").await.unwrap();
        assert_ne!(a, b);
        assert!(uuid::Uuid::parse_str(&a).is_ok());
    }

    #[tokio::test]
    async fn test_results_for_missing_poll() {
        let engine = engine();
        assert!(matches!(
            engine.results("nope").await,
            Err(PollError::NotFound)
        ));
    }

    #[tokio::test]
    async fn test_vote_on_missing_poll() {
        let engine = engine();
        let result = engine.cast_vote(vote("nope", 1, "A", ip(1))).await;
        assert!(matches!(result, Err(PollError::NotFound)));
    }

    #[tokio::test]
    async fn test_vote_requires_name() {
        let engine = engine();
        let poll_id = engine.create_poll("Q", "a, b").await.unwrap();
        let a = option_id(&engine, &poll_id, "a").await;

        let mut request = vote(&poll_id, a, "", ip(1));
        assert!(matches!(
            engine.cast_vote(request.clone()).await,
            Err(PollError::InvalidInput(ref m)) if m == "Invalid name"
        ));

        request.name = None;
        assert!(matches!(
            engine.cast_vote(request).await,
            Err(PollError::InvalidInput(_))
        ));
    }

    #[tokio::test]
    async fn test_name_is_checked_before_poll_lookup() {
        let engine = engine();
        let result = engine.cast_vote(vote("nope", 1, " ", ip(1))).await;
        assert!(matches!(result, Err(PollError::InvalidInput(_))));
    }

    #[tokio::test]
    async fn test_vote_with_foreign_option_is_rejected() {
        let engine = engine();
        let first = engine.create_poll("Q1", "a, b").await.unwrap();
        let second = engine.create_poll("Q2", "c, d").await.unwrap();
        let c = option_id(&engine, &second, "c").await;

        let result = engine.cast_vote(vote(&first, c, "A", ip(1))).await;
        assert!(matches!(result, Err(PollError::InvalidInput(ref m)) if m == INVALID_OPTION));
        assert_eq!(engine.results(&first).await.unwrap().total_votes, 0);
        assert_eq!(engine.results(&second).await.unwrap().total_votes, 0);
    }

    #[tokio::test]
    async fn test_vote_with_malformed_option() {
        let engine = engine();
        let poll_id = engine.create_poll("Q", "a, b").await.unwrap();

        let mut request = vote(&poll_id, 0, "A", ip(1));
        request.option = Some("green".to_string());
        assert!(matches!(
            engine.cast_vote(request.clone()).await,
            Err(PollError::InvalidInput(_))
        ));

        request.option = None;
        assert!(matches!(
            engine.cast_vote(request).await,
            Err(PollError::InvalidInput(_))
        ));
    }

    #[tokio::test]
    async fn test_duplicate_wins_over_bad_option() {
        let engine = engine();
        let poll_id = engine.create_poll("Q", "a, b").await.unwrap();
        let a = option_id(&engine, &poll_id, "a").await;
        engine.cast_vote(vote(&poll_id, a, "A", ip(1))).await.unwrap();

        let result = engine.cast_vote(vote(&poll_id, 9999, "A", ip(1))).await;
        assert!(matches!(result, Err(PollError::DuplicateVote)));
    }

    #[tokio::test]
    async fn test_ipv4_mapped_address_is_same_voter() {
        let engine = engine();
        let poll_id = engine.create_poll("Q", "a, b").await.unwrap();
        let a = option_id(&engine, &poll_id, "a").await;

        engine.cast_vote(vote(&poll_id, a, "A", ip(7))).await.unwrap();

        let mapped = IpAddr::V6(Ipv4Addr::new(192, 168, 0, 7).to_ipv6_mapped());
        let result = engine.cast_vote(vote(&poll_id, a, "A", mapped)).await;
        assert!(matches!(result, Err(PollError::DuplicateVote)));

        let v6 = IpAddr::V6(Ipv6Addr::LOCALHOST);
        engine.cast_vote(vote(&poll_id, a, "C", v6)).await.unwrap();
    }

    #[tokio::test]
    async fn test_total_matches_sum_of_options() {
        let engine = engine();
        let poll_id = engine.create_poll("Q", "a, b, c").await.unwrap();
        let ids = [
            option_id(&engine, &poll_id, "a").await,
            option_id(&engine, &poll_id, "b").await,
            option_id(&engine, &poll_id, "c").await,
        ];

        for n in 0..10u8 {
            let option = ids[n as usize % ids.len()];
            engine
                .cast_vote(vote(&poll_id, option, "voter", ip(n)))
                .await
                .unwrap();
        }

        let results = engine.results(&poll_id).await.unwrap();
        let sum: usize = results.options.iter().map(|o| o.vote_count()).sum();
        assert_eq!(results.total_votes, 10);
        assert_eq!(sum, results.total_votes);
    }
}
