//! The vote/karma ledger.
//!
//! Pure rules mapping a vote or accept-answer request to the row mutation,
//! counter deltas, and karma delta that the store must apply as one atomic
//! unit. Nothing here touches storage; the functions are total and the
//! arithmetic is the single source of truth for every weight in the system.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ─── Karma weights ───────────────────────────────────────────────────────────

/// Karma to a post author per live upvote on the post.
pub const POST_UPVOTE_KARMA: i64 = 10;
/// Karma to a post author per live downvote on the post.
pub const POST_DOWNVOTE_KARMA: i64 = -2;
/// Karma to a comment author per live upvote on the comment.
pub const COMMENT_UPVOTE_KARMA: i64 = 5;
/// Karma to a comment author per live downvote on the comment.
pub const COMMENT_DOWNVOTE_KARMA: i64 = -1;
/// One-time bonus to a comment author while their answer is accepted.
pub const ACCEPTED_ANSWER_KARMA: i64 = 15;

// ─── Vote state machine ──────────────────────────────────────────────────────

/// Direction of a vote. A (user, target) pair holds at most one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VoteKind {
  Upvote,
  Downvote,
}

impl VoteKind {
  pub fn as_str(&self) -> &'static str {
    match self {
      VoteKind::Upvote => "upvote",
      VoteKind::Downvote => "downvote",
    }
  }

  pub fn parse(s: &str) -> Option<Self> {
    match s {
      "upvote" => Some(VoteKind::Upvote),
      "downvote" => Some(VoteKind::Downvote),
      _ => None,
    }
  }
}

/// What kind of entity a vote lands on. Karma weights are asymmetric by
/// target and direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoteTarget {
  Post,
  Comment,
}

impl VoteTarget {
  /// Karma delta to the target's author for one live vote of `kind`.
  pub fn karma_weight(self, kind: VoteKind) -> i64 {
    match (self, kind) {
      (VoteTarget::Post, VoteKind::Upvote) => POST_UPVOTE_KARMA,
      (VoteTarget::Post, VoteKind::Downvote) => POST_DOWNVOTE_KARMA,
      (VoteTarget::Comment, VoteKind::Upvote) => COMMENT_UPVOTE_KARMA,
      (VoteTarget::Comment, VoteKind::Downvote) => COMMENT_DOWNVOTE_KARMA,
    }
  }
}

/// Mutation to perform on the stored vote row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowAction {
  Insert,
  Delete,
  Update,
}

/// How the transition is reported back to the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VoteAction {
  Created,
  Updated,
  Removed,
}

/// The full effect of one vote request.
///
/// The store applies `row`, both count deltas on the target, and
/// `karma_delta` on the target's author inside a single transaction —
/// partial application is a consistency violation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VoteOutcome {
  pub action:         VoteAction,
  pub row:            RowAction,
  /// Vote recorded after the transition; `None` after a toggle-off.
  pub vote:           Option<VoteKind>,
  pub upvote_delta:   i64,
  pub downvote_delta: i64,
  pub karma_delta:    i64,
}

/// Resolve a vote request against the current vote state.
///
/// - no current vote: create the row, apply the full delta;
/// - same kind resubmitted: toggle off — delete the row, reverse the delta;
/// - opposite kind: update the row in place, reversing the old delta and
///   applying the new one in the same operation.
pub fn vote_transition(
  target:    VoteTarget,
  current:   Option<VoteKind>,
  requested: VoteKind,
) -> VoteOutcome {
  let (up, down) = match requested {
    VoteKind::Upvote => (1, 0),
    VoteKind::Downvote => (0, 1),
  };

  match current {
    None => VoteOutcome {
      action:         VoteAction::Created,
      row:            RowAction::Insert,
      vote:           Some(requested),
      upvote_delta:   up,
      downvote_delta: down,
      karma_delta:    target.karma_weight(requested),
    },
    Some(existing) if existing == requested => VoteOutcome {
      action:         VoteAction::Removed,
      row:            RowAction::Delete,
      vote:           None,
      upvote_delta:   -up,
      downvote_delta: -down,
      karma_delta:    -target.karma_weight(requested),
    },
    Some(existing) => {
      let (old_up, old_down) = match existing {
        VoteKind::Upvote => (1, 0),
        VoteKind::Downvote => (0, 1),
      };
      VoteOutcome {
        action:         VoteAction::Updated,
        row:            RowAction::Update,
        vote:           Some(requested),
        upvote_delta:   up - old_up,
        downvote_delta: down - old_down,
        karma_delta:    target.karma_weight(requested) - target.karma_weight(existing),
      }
    }
  }
}

// ─── Accept-answer state machine ─────────────────────────────────────────────

/// Transition of a post's `accepted_answer_id` when its author requests
/// accepting `requested`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcceptTransition {
  /// No answer was accepted; accept `requested` and award the bonus.
  Accept,
  /// `requested` was already accepted; unaccept it and reverse the bonus.
  Unaccept,
  /// A different comment was accepted; move the flag and the bonus.
  Transfer { previous: Uuid },
}

pub fn accept_transition(current: Option<Uuid>, requested: Uuid) -> AcceptTransition {
  match current {
    None => AcceptTransition::Accept,
    Some(c) if c == requested => AcceptTransition::Unaccept,
    Some(c) => AcceptTransition::Transfer { previous: c },
  }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
