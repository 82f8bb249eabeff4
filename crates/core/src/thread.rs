//! Comment reply trees.
//!
//! Comments are stored flat with an optional parent. Posts display a single
//! level of nesting: every reply hangs off the top-level comment that starts
//! its thread, however deep the reply chain went.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::types::{CommentId, UserId};

/// A comment row as loaded from storage.
#[derive(Debug, Clone)]
pub struct CommentRecord {
    pub id: CommentId,
    pub parent_id: Option<CommentId>,
    pub author_id: UserId,
    pub author_name: String,
    pub body: String,
    pub created_at: DateTime<Utc>,
}

/// A comment with its vote score and direct replies.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentNode {
    pub id: CommentId,
    pub parent_comment_id: Option<CommentId>,
    pub author_id: UserId,
    pub author_name: String,
    pub body: String,
    pub created_at: DateTime<Utc>,
    pub score: i64,
    pub replies: Vec<CommentNode>,
}

impl CommentNode {
    fn from_record(record: CommentRecord, score: i64) -> Self {
        Self {
            id: record.id,
            parent_comment_id: record.parent_id,
            author_id: record.author_id,
            author_name: record.author_name,
            body: record.body,
            created_at: record.created_at,
            score,
            replies: Vec::new(),
        }
    }
}

/// Assemble flat comments into a one-level tree.
///
/// - Top-level comments and replies are both ordered by creation time.
/// - A reply whose parent is itself a reply is attached to the root of
///   that chain.
/// - A reply whose parent is missing (deleted, or from another post) is
///   promoted to top level.
/// - Comments without an entry in `scores` get a score of zero.
#[must_use]
pub fn build_thread(
    mut comments: Vec<CommentRecord>,
    scores: &HashMap<CommentId, i64>,
) -> Vec<CommentNode> {
    comments.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));

    let parents: HashMap<CommentId, Option<CommentId>> =
        comments.iter().map(|c| (c.id, c.parent_id)).collect();

    let root_of = |id: CommentId| -> CommentId {
        let mut current = id;
        // Bounded walk; a corrupt parent cycle stops at the comment count.
        for _ in 0..parents.len() {
            match parents.get(&current).copied().flatten() {
                Some(parent) if parents.contains_key(&parent) => current = parent,
                _ => break,
            }
        }
        current
    };

    let mut roots: Vec<CommentNode> = Vec::new();
    let mut index: HashMap<CommentId, usize> = HashMap::new();
    let mut replies: Vec<(CommentId, CommentNode)> = Vec::new();

    for record in comments {
        let score = scores.get(&record.id).copied().unwrap_or(0);
        let root = root_of(record.id);
        let node = CommentNode::from_record(record, score);
        if root == node.id {
            index.insert(node.id, roots.len());
            roots.push(node);
        } else {
            replies.push((root, node));
        }
    }

    for (root, reply) in replies {
        if let Some(node) = index.get(&root).and_then(|&i| roots.get_mut(i)) {
            node.replies.push(reply);
        }
    }

    roots
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use chrono::TimeZone;
    use uuid::Uuid;

    use super::*;

    fn comment(id: i32, parent: Option<i32>, minute: u32) -> CommentRecord {
        CommentRecord {
            id: CommentId::new(id),
            parent_id: parent.map(CommentId::new),
            author_id: UserId::new(Uuid::nil()),
            author_name: format!("user{id}"),
            body: format!("comment {id}"),
            created_at: Utc.with_ymd_and_hms(2024, 5, 1, 12, minute, 0).unwrap(),
        }
    }

    #[test]
    fn test_replies_attach_to_parent_in_order() {
        let comments = vec![
            comment(3, Some(1), 3),
            comment(1, None, 1),
            comment(2, None, 2),
            comment(4, Some(1), 4),
        ];
        let tree = build_thread(comments, &HashMap::new());

        assert_eq!(tree.len(), 2);
        assert_eq!(tree[0].id, CommentId::new(1));
        assert_eq!(tree[1].id, CommentId::new(2));
        let reply_ids: Vec<i32> = tree[0].replies.iter().map(|r| r.id.as_i32()).collect();
        assert_eq!(reply_ids, vec![3, 4]);
        assert!(tree[1].replies.is_empty());
    }

    #[test]
    fn test_nested_reply_flattens_to_root() {
        let comments = vec![
            comment(1, None, 1),
            comment(2, Some(1), 2),
            comment(3, Some(2), 3),
        ];
        let tree = build_thread(comments, &HashMap::new());

        assert_eq!(tree.len(), 1);
        assert_eq!(tree[0].replies.len(), 2);
        assert_eq!(tree[0].replies[1].parent_comment_id, Some(CommentId::new(2)));
    }

    #[test]
    fn test_orphan_promoted_to_top_level() {
        let comments = vec![comment(5, Some(99), 1), comment(6, None, 2)];
        let tree = build_thread(comments, &HashMap::new());
        let ids: Vec<i32> = tree.iter().map(|n| n.id.as_i32()).collect();
        assert_eq!(ids, vec![5, 6]);
    }

    #[test]
    fn test_scores_applied_with_zero_default() {
        let comments = vec![comment(1, None, 1), comment(2, Some(1), 2)];
        let scores = HashMap::from([(CommentId::new(2), -3)]);
        let tree = build_thread(comments, &scores);

        assert_eq!(tree[0].score, 0);
        assert_eq!(tree[0].replies[0].score, -3);
    }

    #[test]
    fn test_parent_cycle_terminates() {
        let comments = vec![comment(1, Some(2), 1), comment(2, Some(1), 2)];
        let tree = build_thread(comments, &HashMap::new());
        let total: usize = tree.iter().map(|n| 1 + n.replies.len()).sum();
        assert!(total <= 2);
    }
}
