use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};

use super::Comment;

/// Comments of one book arranged for display: top-level comments and one
/// bucket of replies per parent.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CommentThreads {
    top_level: Vec<Comment>,
    replies: HashMap<String, Vec<Comment>>,
}

impl CommentThreads {
    /// Partition and sort a flat snapshot.
    ///
    /// Top-level comments: score descending, then newest first.
    /// Replies: score descending, then oldest first.
    pub fn build(comments: impl IntoIterator<Item = Comment>) -> Self {
        let mut top_level = Vec::new();
        let mut replies: HashMap<String, Vec<Comment>> = HashMap::new();

        for comment in comments {
            match comment.parent_id.clone() {
                Some(parent_id) => replies.entry(parent_id).or_default().push(comment),
                None => top_level.push(comment),
            }
        }

        top_level.sort_by(|a, b| {
            by_score(a, b).then_with(|| b.created_millis().cmp(&a.created_millis()))
        });
        for bucket in replies.values_mut() {
            bucket.sort_by(|a, b| {
                by_score(a, b).then_with(|| a.created_millis().cmp(&b.created_millis()))
            });
        }

        Self { top_level, replies }
    }

    pub fn top_level(&self) -> &[Comment] {
        &self.top_level
    }

    /// Replies to `parent_id`, sorted. Empty when there are none.
    pub fn replies_to(&self, parent_id: &str) -> &[Comment] {
        self.replies.get(parent_id).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn replies_by_parent_id(&self) -> &HashMap<String, Vec<Comment>> {
        &self.replies
    }

    /// Top-level comments paired with their replies, in display order.
    pub fn threads(&self) -> impl Iterator<Item = (&Comment, &[Comment])> {
        self.top_level
            .iter()
            .map(move |comment| (comment, self.replies_to(&comment.id)))
    }

    /// Replies whose parent is not a displayed top-level comment: the parent
    /// was deleted or is itself a reply. These are not rendered.
    pub fn orphaned_replies(&self) -> Vec<&Comment> {
        let roots: HashSet<&str> = self.top_level.iter().map(|c| c.id.as_str()).collect();
        let mut orphans: Vec<&Comment> = self
            .replies
            .iter()
            .filter(|(parent_id, _)| !roots.contains(parent_id.as_str()))
            .flat_map(|(_, bucket)| bucket.iter())
            .collect();
        orphans.sort_by(|a, b| {
            a.created_millis()
                .cmp(&b.created_millis())
                .then_with(|| a.id.cmp(&b.id))
        });
        orphans
    }

    /// Total number of comments, replies included.
    pub fn len(&self) -> usize {
        self.top_level.len() + self.replies.values().map(Vec::len).sum::<usize>()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn by_score(a: &Comment, b: &Comment) -> Ordering {
    b.score.cmp(&a.score)
}
