//! Poll Store
//!
//! Storage seam for polls, options and votes, plus the SQLite implementation.
//!
//! The SQLite schema (see `migrations/`) carries the integrity rules itself:
//! votes reference `(poll_option_id, poll_id)` as a composite foreign key and
//! are unique per `(poll_id, voter_ip)`. Inserting a vote is one conditional
//! statement, so two concurrent votes from the same address cannot both land.

use super::types::{NewVote, OptionId, Poll, PollOption, VoteRecord};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::{Row, SqliteConnection, SqlitePool};
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

/// Store-level failures
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("A vote from this voter already exists for the poll")]
    DuplicateVote,

    #[error("Poll '{0}' already exists")]
    PollExists(String),

    #[error("Option {0} does not belong to the poll")]
    OptionNotInPoll(OptionId),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Durable storage for polls. Implementations synchronize internally and are
/// shared across concurrent requests behind an `Arc`.
#[async_trait::async_trait]
pub trait PollStore: Send + Sync {
    /// Insert the poll row and all option rows as one atomic unit
    async fn create_poll(&self, poll: &Poll, options: &[String])
        -> Result<Vec<PollOption>, StoreError>;

    async fn get_poll(&self, poll_id: &str) -> Result<Option<Poll>, StoreError>;

    async fn options_for_poll(&self, poll_id: &str) -> Result<Vec<PollOption>, StoreError>;

    /// All votes cast on the poll's options
    async fn votes_for_poll(&self, poll_id: &str) -> Result<Vec<VoteRecord>, StoreError>;

    /// The vote a voter address already cast on this poll, if any
    async fn find_vote(
        &self,
        poll_id: &str,
        voter_ip: &str,
    ) -> Result<Option<VoteRecord>, StoreError>;

    /// Record a vote. Fails with `DuplicateVote` if the address already voted
    /// on the poll and with `OptionNotInPoll` if the option belongs elsewhere.
    async fn insert_vote(&self, vote: &NewVote) -> Result<(), StoreError>;
}

/// SQLite-backed poll store
#[derive(Debug, Clone)]
pub struct SqlitePollStore {
    pool: SqlitePool,
}

impl SqlitePollStore {
    /// Open (creating if missing) the database at `url`.
    ///
    /// In-memory databases get a single long-lived connection, since every
    /// new SQLite connection to `:memory:` would see an empty database.
    pub async fn connect(url: &str, max_connections: u32) -> Result<Self, StoreError> {
        let in_memory = is_memory_url(url);

        let mut options = SqliteConnectOptions::from_str(url)?
            .create_if_missing(true)
            .foreign_keys(true)
            .busy_timeout(Duration::from_secs(5));
        if !in_memory {
            options = options.journal_mode(SqliteJournalMode::Wal);
        }

        let pool_options = if in_memory {
            SqlitePoolOptions::new()
                .max_connections(1)
                .min_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
        } else {
            SqlitePoolOptions::new().max_connections(max_connections.max(1))
        };

        let pool = pool_options.connect_with(options).await?;
        tracing::debug!(url, in_memory, "Opened SQLite poll store");

        Ok(Self { pool })
    }

    /// Wrap an existing pool
    pub fn from_pool(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

fn is_memory_url(url: &str) -> bool {
    url.contains(":memory:") || url.contains("mode=memory")
}

async fn insert_poll(conn: &mut SqliteConnection, poll: &Poll) -> Result<(), sqlx::Error> {
    sqlx::query("INSERT INTO polls (id, question) VALUES (?1, ?2)")
        .bind(&poll.id)
        .bind(&poll.question)
        .execute(&mut *conn)
        .await?;
    Ok(())
}

async fn insert_option(
    conn: &mut SqliteConnection,
    poll_id: &str,
    option_text: &str,
) -> Result<PollOption, sqlx::Error> {
    let result = sqlx::query("INSERT INTO poll_options (poll_id, option_text) VALUES (?1, ?2)")
        .bind(poll_id)
        .bind(option_text)
        .execute(&mut *conn)
        .await?;

    Ok(PollOption {
        id: result.last_insert_rowid(),
        poll_id: poll_id.to_string(),
        option_text: option_text.to_string(),
    })
}

fn vote_from_row(row: &sqlx::sqlite::SqliteRow) -> Result<VoteRecord, sqlx::Error> {
    Ok(VoteRecord {
        poll_option_id: row.try_get("poll_option_id")?,
        voter_name: row.try_get("voter_name")?,
    })
}

#[async_trait::async_trait]
impl PollStore for SqlitePollStore {
    async fn create_poll(
        &self,
        poll: &Poll,
        options: &[String],
    ) -> Result<Vec<PollOption>, StoreError> {
        let mut tx = self.pool.begin().await?;

        match insert_poll(&mut tx, poll).await {
            Err(sqlx::Error::Database(e)) if e.is_unique_violation() => {
                return Err(StoreError::PollExists(poll.id.clone()));
            }
            other => other?,
        }

        let mut stored = Vec::with_capacity(options.len());
        for text in options {
            stored.push(insert_option(&mut tx, &poll.id, text).await?);
        }

        tx.commit().await?;
        Ok(stored)
    }

    async fn get_poll(&self, poll_id: &str) -> Result<Option<Poll>, StoreError> {
        let row = sqlx::query("SELECT id, question FROM polls WHERE id = ?1")
            .bind(poll_id)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => Ok(Some(Poll {
                id: row.try_get("id")?,
                question: row.try_get("question")?,
            })),
            None => Ok(None),
        }
    }

    async fn options_for_poll(&self, poll_id: &str) -> Result<Vec<PollOption>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT id, poll_id, option_text
            FROM poll_options
            WHERE poll_id = ?1
            ORDER BY id
            "#,
        )
        .bind(poll_id)
        .fetch_all(&self.pool)
        .await?;

        let mut options = Vec::with_capacity(rows.len());
        for row in rows {
            options.push(PollOption {
                id: row.try_get("id")?,
                poll_id: row.try_get("poll_id")?,
                option_text: row.try_get("option_text")?,
            });
        }
        Ok(options)
    }

    async fn votes_for_poll(&self, poll_id: &str) -> Result<Vec<VoteRecord>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT v.poll_option_id, v.voter_name
            FROM votes v
            JOIN poll_options po ON v.poll_option_id = po.id
            WHERE po.poll_id = ?1
            ORDER BY v.id
            "#,
        )
        .bind(poll_id)
        .fetch_all(&self.pool)
        .await?;

        let votes = rows
            .iter()
            .map(vote_from_row)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(votes)
    }

    async fn find_vote(
        &self,
        poll_id: &str,
        voter_ip: &str,
    ) -> Result<Option<VoteRecord>, StoreError> {
        let row = sqlx::query(
            r#"
            SELECT v.poll_option_id, v.voter_name
            FROM votes v
            JOIN poll_options po ON v.poll_option_id = po.id
            WHERE po.poll_id = ?1 AND v.voter_ip = ?2
            LIMIT 1
            "#,
        )
        .bind(poll_id)
        .bind(voter_ip)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.as_ref().map(vote_from_row).transpose()?)
    }

    async fn insert_vote(&self, vote: &NewVote) -> Result<(), StoreError> {
        // Selecting the option row both proves it belongs to the poll and
        // supplies the poll id that the uniqueness constraint is keyed on.
        let result = sqlx::query(
            r#"
            INSERT INTO votes (poll_id, poll_option_id, voter_ip, voter_name)
            SELECT poll_id, id, ?3, ?4
            FROM poll_options
            WHERE id = ?2 AND poll_id = ?1
            "#,
        )
        .bind(&vote.poll_id)
        .bind(vote.option_id)
        .bind(&vote.voter_ip)
        .bind(&vote.voter_name)
        .execute(&self.pool)
        .await;

        match result {
            Ok(done) if done.rows_affected() == 0 => {
                Err(StoreError::OptionNotInPoll(vote.option_id))
            }
            Ok(_) => Ok(()),
            Err(sqlx::Error::Database(e)) if e.is_unique_violation() => {
                Err(StoreError::DuplicateVote)
            }
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::migrations::MigrationRunner;

    async fn test_store() -> SqlitePollStore {
        let store = SqlitePollStore::connect("sqlite::memory:", 1).await.unwrap();
        MigrationRunner::new(store.pool().clone())
            .run_migrations()
            .await
            .unwrap();
        store
    }

    fn poll(id: &str) -> Poll {
        Poll {
            id: id.to_string(),
            question: "Best color?".to_string(),
        }
    }

    fn options(texts: &[&str]) -> Vec<String> {
        texts.iter().map(|t| t.to_string()).collect()
    }

    fn vote(poll_id: &str, option_id: OptionId, ip: &str, name: &str) -> NewVote {
        NewVote {
            poll_id: poll_id.to_string(),
            option_id,
            voter_ip: ip.to_string(),
            voter_name: name.to_string(),
        }
    }

    #[tokio::test]
    async fn test_create_and_fetch_poll() {
        let store = test_store().await;
        let stored = store
            .create_poll(&poll("p1"), &options(&["Red", "Green", "Blue"]))
            .await
            .unwrap();
        assert_eq!(stored.len(), 3);

        assert_eq!(store.get_poll("p1").await.unwrap(), Some(poll("p1")));
        assert_eq!(store.get_poll("missing").await.unwrap(), None);

        let fetched = store.options_for_poll("p1").await.unwrap();
        assert_eq!(fetched, stored);
        let texts: Vec<_> = fetched.iter().map(|o| o.option_text.as_str()).collect();
        assert_eq!(texts, vec!["Red", "Green", "Blue"]);
    }

    #[tokio::test]
    async fn test_failed_creation_writes_nothing() {
        let store = test_store().await;
        store
            .create_poll(&poll("p1"), &options(&["a", "b"]))
            .await
            .unwrap();

        // Same id again: the poll insert fails, so no extra options may appear.
        let again = store.create_poll(&poll("p1"), &options(&["c", "d"])).await;
        assert!(matches!(again, Err(StoreError::PollExists(ref id)) if id == "p1"));
        assert_eq!(store.options_for_poll("p1").await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_insert_and_find_vote() {
        let store = test_store().await;
        let opts = store
            .create_poll(&poll("p1"), &options(&["a", "b"]))
            .await
            .unwrap();

        assert!(store.find_vote("p1", "10.0.0.1").await.unwrap().is_none());
        store
            .insert_vote(&vote("p1", opts[1].id, "10.0.0.1", "ann"))
            .await
            .unwrap();

        let found = store.find_vote("p1", "10.0.0.1").await.unwrap().unwrap();
        assert_eq!(found.poll_option_id, opts[1].id);
        assert_eq!(found.voter_name, "ann");

        let votes = store.votes_for_poll("p1").await.unwrap();
        assert_eq!(votes, vec![found]);
    }

    #[tokio::test]
    async fn test_unique_constraint_rejects_second_vote() {
        let store = test_store().await;
        let opts = store
            .create_poll(&poll("p1"), &options(&["a", "b"]))
            .await
            .unwrap();

        store
            .insert_vote(&vote("p1", opts[0].id, "10.0.0.1", "ann"))
            .await
            .unwrap();
        let second = store
            .insert_vote(&vote("p1", opts[1].id, "10.0.0.1", "ann again"))
            .await;
        assert!(matches!(second, Err(StoreError::DuplicateVote)));
        assert_eq!(store.votes_for_poll("p1").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_same_voter_may_vote_in_different_polls() {
        let store = test_store().await;
        let first = store
            .create_poll(&poll("p1"), &options(&["a", "b"]))
            .await
            .unwrap();
        let second = store
            .create_poll(&poll("p2"), &options(&["c", "d"]))
            .await
            .unwrap();

        store
            .insert_vote(&vote("p1", first[0].id, "10.0.0.1", "ann"))
            .await
            .unwrap();
        store
            .insert_vote(&vote("p2", second[0].id, "10.0.0.1", "ann"))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_vote_for_foreign_option_is_rejected() {
        let store = test_store().await;
        store
            .create_poll(&poll("p1"), &options(&["a", "b"]))
            .await
            .unwrap();
        let other = store
            .create_poll(&poll("p2"), &options(&["c", "d"]))
            .await
            .unwrap();

        let result = store
            .insert_vote(&vote("p1", other[0].id, "10.0.0.1", "ann"))
            .await;
        assert!(matches!(result, Err(StoreError::OptionNotInPoll(id)) if id == other[0].id));
        assert!(store.votes_for_poll("p1").await.unwrap().is_empty());
        assert!(store.votes_for_poll("p2").await.unwrap().is_empty());
    }
}
