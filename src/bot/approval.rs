//! Vote parsing: decides whether bot-directed text is an approval vote.

use std::sync::LazyLock;

use regex::Regex;

use super::{ApprovalVote, Decision};

/// Keyword that approves a pending request.
pub const APPROVE_KEYWORD: &str = "approve";

/// Keyword that rejects a pending request.
pub const REJECT_KEYWORD: &str = "reject";

static VOTE_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?i)(approve|reject)(?:\s+(\S+))?\s*").expect("vote pattern is valid")
});

/// Recognizes vote-shaped text.
///
/// Authorization of the voter is not decided here; the approvals pipeline
/// checks it when it applies the vote.
pub trait VoteParser: Send + Sync {
    /// Return a vote when `text` is vote-shaped.
    fn parse(&self, voter_id: &str, text: &str) -> Option<ApprovalVote>;
}

/// Default parser: `approve <id>` / `reject <id>`.
#[derive(Debug, Clone, Copy, Default)]
pub struct KeywordVoteParser;

impl VoteParser for KeywordVoteParser {
    fn parse(&self, voter_id: &str, text: &str) -> Option<ApprovalVote> {
        let caps = VOTE_PATTERN.captures(text.trim())?;
        let keyword = caps.get(1)?.as_str().to_lowercase();

        // "approvers list" must not count as a vote.
        let rest = &text.trim()[caps.get(1)?.end()..];
        if rest.chars().next().is_some_and(|c| !c.is_whitespace()) {
            return None;
        }

        let decision = match keyword.as_str() {
            APPROVE_KEYWORD => Decision::Approve,
            REJECT_KEYWORD => Decision::Reject,
            _ => Decision::Unknown,
        };

        Some(ApprovalVote {
            voter_id: voter_id.to_string(),
            decision,
            subject: caps
                .get(2)
                .map(|m| m.as_str().to_string())
                .unwrap_or_default(),
        })
    }
}

impl<F> VoteParser for F
where
    F: Fn(&str, &str) -> Option<ApprovalVote> + Send + Sync,
{
    fn parse(&self, voter_id: &str, text: &str) -> Option<ApprovalVote> {
        self(voter_id, text)
    }
}
