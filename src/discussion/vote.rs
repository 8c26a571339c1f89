use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::VoteType;
use crate::document::Fields;

/// Where a user currently stands on a comment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoteState {
    Up,
    Down,
    None,
}

/// The vote sets of one comment.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Votes {
    #[serde(default)]
    pub upvotes: Vec<String>,
    #[serde(default)]
    pub downvotes: Vec<String>,
}

impl Votes {
    pub fn score(&self) -> i64 {
        self.upvotes.len() as i64 - self.downvotes.len() as i64
    }

    pub fn vote_of(&self, user_id: &str) -> VoteState {
        if self.upvotes.iter().any(|u| u == user_id) {
            VoteState::Up
        } else if self.downvotes.iter().any(|u| u == user_id) {
            VoteState::Down
        } else {
            VoteState::None
        }
    }

    /// The update written back by a vote: both sets and the recomputed score.
    pub fn to_update(&self) -> Fields {
        let mut update = Fields::new();
        update.insert("upvotes".into(), Value::from(self.upvotes.clone()));
        update.insert("downvotes".into(), Value::from(self.downvotes.clone()));
        update.insert("score".into(), Value::from(self.score()));
        update
    }
}

/// Toggle `user_id`'s vote.
///
/// Voting the same way twice removes the vote. Voting one way always removes
/// the user from the other set, so a user is never in both.
pub fn apply_vote(votes: &Votes, user_id: &str, vote: VoteType) -> Votes {
    let (same, other) = match vote {
        VoteType::Up => (&votes.upvotes, &votes.downvotes),
        VoteType::Down => (&votes.downvotes, &votes.upvotes),
    };

    let mut same = same.clone();
    let mut other = other.clone();
    if same.iter().any(|u| u == user_id) {
        same.retain(|u| u != user_id);
    } else {
        same.push(user_id.to_string());
        other.retain(|u| u != user_id);
    }

    match vote {
        VoteType::Up => Votes {
            upvotes: same,
            downvotes: other,
        },
        VoteType::Down => Votes {
            upvotes: other,
            downvotes: same,
        },
    }
}
