//! Poll Configuration
//!
//! Size limits for poll input and the validated form of a create-poll request.

use super::error::PollError;
use serde::{Deserialize, Serialize};

pub const INVALID_POLL: &str = "Invalid question or options";

/// Limits applied to user-supplied poll text
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PollLimits {
    /// Maximum number of options per poll
    pub max_options: usize,
    /// Maximum question length in characters
    pub max_question_len: usize,
    /// Maximum length of a single option in characters
    pub max_option_len: usize,
    /// Maximum voter name length in characters
    pub max_name_len: usize,
}

impl Default for PollLimits {
    fn default() -> Self {
        Self {
            max_options: 50,
            max_question_len: 500,
            max_option_len: 200,
            max_name_len: 100,
        }
    }
}

/// Create-poll input that has passed validation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewPoll {
    pub question: String,
    pub options: Vec<String>,
}

impl NewPoll {
    /// Validate a raw question and comma-separated option list.
    ///
    /// Options are trimmed and empty segments dropped; duplicates are kept.
    pub fn parse(question: &str, options: &str, limits: &PollLimits) -> Result<Self, PollError> {
        let question = question.trim();
        let options = split_options(options);

        if question.is_empty() || options.len() < 2 {
            return Err(PollError::invalid(INVALID_POLL));
        }
        if question.chars().count() > limits.max_question_len {
            return Err(PollError::invalid(format!(
                "Question cannot be longer than {} characters",
                limits.max_question_len
            )));
        }
        if options.len() > limits.max_options {
            return Err(PollError::invalid(format!(
                "Poll cannot have more than {} options",
                limits.max_options
            )));
        }
        if options
            .iter()
            .any(|o| o.chars().count() > limits.max_option_len)
        {
            return Err(PollError::invalid(format!(
                "Options cannot be longer than {} characters",
                limits.max_option_len
            )));
        }

        Ok(Self {
            question: question.to_string(),
            options,
        })
    }
}

/// Split on commas, trim, drop empty entries
pub fn split_options(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|o| !o.is_empty())
        .map(str::to_string)
        .collect()
}

/// Trim and check a voter display name
pub fn validate_voter_name(name: &str, limits: &PollLimits) -> Result<String, PollError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(PollError::invalid("Invalid name"));
    }
    if name.chars().count() > limits.max_name_len {
        return Err(PollError::invalid(format!(
            "Name cannot be longer than {} characters",
            limits.max_name_len
        )));
    }
    Ok(name.to_string())
}
