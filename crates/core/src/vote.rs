//! Up/down votes on forum posts and comments.
//!
//! A user holds at most one vote per target. Submitting the same direction
//! twice undoes the vote; submitting the opposite direction flips it.

use serde::{Deserialize, Serialize};

#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("vote value must be 1 or -1, got {0}")]
pub struct VoteError(pub i64);

/// A signed vote, stored as `+1` or `-1`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "i16", into = "i16")]
pub enum VoteValue {
    Up,
    Down,
}

impl VoteValue {
    #[must_use]
    pub const fn as_i16(self) -> i16 {
        match self {
            Self::Up => 1,
            Self::Down => -1,
        }
    }
}

impl TryFrom<i16> for VoteValue {
    type Error = VoteError;

    fn try_from(value: i16) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Self::Up),
            -1 => Ok(Self::Down),
            other => Err(VoteError(i64::from(other))),
        }
    }
}

impl From<VoteValue> for i16 {
    fn from(value: VoteValue) -> Self {
        value.as_i16()
    }
}

/// What to do with the stored vote row after a vote request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoteAction {
    /// Delete the existing row; the user no longer has a vote on the target.
    Remove,
    /// Insert the row, or overwrite an opposite vote.
    Upsert(VoteValue),
}

impl VoteAction {
    /// Decide how a vote request changes the stored row.
    ///
    /// ```
    /// use discvault_core::{VoteAction, VoteValue};
    ///
    /// assert_eq!(VoteAction::resolve(None, VoteValue::Up), VoteAction::Upsert(VoteValue::Up));
    /// assert_eq!(VoteAction::resolve(Some(VoteValue::Up), VoteValue::Up), VoteAction::Remove);
    /// ```
    #[must_use]
    pub fn resolve(existing: Option<VoteValue>, requested: VoteValue) -> Self {
        if existing == Some(requested) {
            Self::Remove
        } else {
            Self::Upsert(requested)
        }
    }

    /// The caller's vote once the action is applied.
    #[must_use]
    pub const fn resulting_vote(self) -> Option<VoteValue> {
        match self {
            Self::Remove => None,
            Self::Upsert(value) => Some(value),
        }
    }
}

/// Running score of a target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct VoteTally {
    pub score: i64,
    pub up: u32,
    pub down: u32,
}

impl VoteTally {
    pub fn record(&mut self, value: VoteValue) {
        self.score += i64::from(value.as_i16());
        match value {
            VoteValue::Up => self.up += 1,
            VoteValue::Down => self.down += 1,
        }
    }
}

impl FromIterator<VoteValue> for VoteTally {
    fn from_iter<I: IntoIterator<Item = VoteValue>>(iter: I) -> Self {
        let mut tally = Self::default();
        for value in iter {
            tally.record(value);
        }
        tally
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_same_vote_twice_removes_it() {
        let first = VoteAction::resolve(None, VoteValue::Up);
        assert_eq!(first.resulting_vote(), Some(VoteValue::Up));

        let second = VoteAction::resolve(first.resulting_vote(), VoteValue::Up);
        assert_eq!(second, VoteAction::Remove);
        assert_eq!(second.resulting_vote(), None);
    }

    #[test]
    fn test_opposite_vote_flips() {
        let action = VoteAction::resolve(Some(VoteValue::Down), VoteValue::Up);
        assert_eq!(action, VoteAction::Upsert(VoteValue::Up));
    }

    #[test]
    fn test_tally_counts_each_direction() {
        let tally: VoteTally = [VoteValue::Up, VoteValue::Down, VoteValue::Up]
            .into_iter()
            .collect();
        assert_eq!(tally.score, 1);
        assert_eq!(tally.up, 2);
        assert_eq!(tally.down, 1);
    }

    #[test]
    fn test_vote_value_parsing() {
        assert_eq!(VoteValue::try_from(1), Ok(VoteValue::Up));
        assert_eq!(VoteValue::try_from(-1), Ok(VoteValue::Down));
        assert_eq!(VoteValue::try_from(0), Err(VoteError(0)));
        assert_eq!(VoteValue::try_from(2), Err(VoteError(2)));
    }

    #[test]
    fn test_vote_value_json() {
        let v: VoteValue = serde_json::from_str("-1").unwrap();
        assert_eq!(v, VoteValue::Down);
        assert!(serde_json::from_str::<VoteValue>("5").is_err());
        assert_eq!(serde_json::to_string(&VoteValue::Up).unwrap(), "1");
    }
}
