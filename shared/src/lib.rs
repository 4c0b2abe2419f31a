use serde::{Deserialize, Serialize};

pub mod board;
pub mod pager;
pub mod stats;
pub mod thread;

pub use board::{Board, VoteRejected, VoteUndo};
pub use pager::Pager;
pub use stats::{OptionTally, SeriesError, SeriesPoint, TimeFrame};
pub use thread::{Affordances, Row, RowKind};

pub type UserId = i64;
pub type TopicId = i64;
pub type CommentId = i64;
pub type ReplyId = i64;

// ── Users ──

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    #[serde(rename = "user_id")]
    pub id: UserId,
    pub username: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub created_at: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Signup {
    pub email: String,
    pub username: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProfileUpdate {
    pub username: String,
    pub email: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserStats {
    #[serde(default)]
    pub topics: i64,
    #[serde(default)]
    pub votes: i64,
    #[serde(default)]
    pub likes: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Activity {
    pub title: String,
    pub created_at: String,
}

// ── Likes ──

/// Liked flag and counter as one unit, so a toggle can be undone exactly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LikeState {
    pub has_liked: bool,
    pub like_count: i64,
}

impl LikeState {
    pub fn toggled(self) -> Self {
        if self.has_liked {
            Self {
                has_liked: false,
                like_count: (self.like_count - 1).max(0),
            }
        } else {
            Self {
                has_liked: true,
                like_count: self.like_count + 1,
            }
        }
    }
}

pub trait Likeable {
    fn like_state(&self) -> LikeState;
    fn set_like_state(&mut self, state: LikeState);

    /// Flips the like and returns the state before the flip.
    fn toggle_like(&mut self) -> LikeState {
        let before = self.like_state();
        self.set_like_state(before.toggled());
        before
    }

    /// Aligns the local flag with the server's answer.
    fn settle_like(&mut self, liked: bool) {
        let current = self.like_state();
        if current.has_liked != liked {
            self.set_like_state(current.toggled());
        }
    }
}

macro_rules! likeable {
    ($($ty:ty),*) => {
        $(impl Likeable for $ty {
            fn like_state(&self) -> LikeState {
                LikeState {
                    has_liked: self.has_liked,
                    like_count: self.like_count,
                }
            }

            fn set_like_state(&mut self, state: LikeState) {
                self.has_liked = state.has_liked;
                self.like_count = state.like_count;
            }
        })*
    };
}

likeable!(Topic, Comment, Reply);

// ── Topics ──

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Topic {
    #[serde(rename = "topic_id")]
    pub id: TopicId,
    pub title: String,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub user_id: UserId,
    pub created_at: String,
    #[serde(rename = "vote_options")]
    pub options: Vec<String>,
    #[serde(rename = "vote_results", default)]
    pub vote_counts: Vec<i64>,
    #[serde(rename = "total_vote", default)]
    pub total_votes: i64,
    #[serde(default)]
    pub has_voted: bool,
    #[serde(default)]
    pub user_vote_index: Option<usize>,
    #[serde(default)]
    pub like_count: i64,
    #[serde(default)]
    pub has_liked: bool,
    #[serde(default)]
    pub is_pinned: bool,
    #[serde(default)]
    pub comment_count: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TopicSort {
    #[default]
    CreatedAt,
    LikeCount,
}

impl TopicSort {
    pub fn as_str(self) -> &'static str {
        match self {
            TopicSort::CreatedAt => "created_at",
            TopicSort::LikeCount => "like_count",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TopicFilter {
    pub category: Option<String>,
    pub search: Option<String>,
}

impl TopicFilter {
    /// Query pairs for the filter. Empty values are left out entirely.
    pub fn pairs(&self) -> Vec<(String, String)> {
        let mut pairs = Vec::new();
        for (key, value) in [("category", &self.category), ("search", &self.search)] {
            if let Some(v) = value.as_deref().map(str::trim).filter(|v| !v.is_empty()) {
                pairs.push((key.to_string(), v.to_string()));
            }
        }
        pairs
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopicQuery {
    pub sort: TopicSort,
    pub limit: usize,
    pub offset: usize,
    pub filter: TopicFilter,
}

impl TopicQuery {
    pub fn pairs(&self) -> Vec<(String, String)> {
        let mut pairs = vec![
            ("sort".to_string(), self.sort.as_str().to_string()),
            ("limit".to_string(), self.limit.to_string()),
            ("offset".to_string(), self.offset.to_string()),
        ];
        pairs.extend(self.filter.pairs());
        pairs
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InvalidTopic {
    #[error("title must not be empty")]
    EmptyTitle,
    #[error("a topic needs between 2 and 4 options, got {0}")]
    OptionCount(usize),
    #[error("option {0} is empty")]
    EmptyOption(usize),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewTopic {
    pub title: String,
    pub category: String,
    pub vote_options: Vec<String>,
    pub description: Option<String>,
}

impl NewTopic {
    pub fn validate(&self) -> Result<(), InvalidTopic> {
        if self.title.trim().is_empty() {
            return Err(InvalidTopic::EmptyTitle);
        }
        if !(2..=4).contains(&self.vote_options.len()) {
            return Err(InvalidTopic::OptionCount(self.vote_options.len()));
        }
        if let Some(i) = self.vote_options.iter().position(|o| o.trim().is_empty()) {
            return Err(InvalidTopic::EmptyOption(i));
        }
        Ok(())
    }
}

// ── Votes ──

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CastVote {
    pub topic_id: TopicId,
    pub vote_index: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VoteReceipt {
    #[serde(default)]
    pub vote_id: Option<i64>,
    pub topic_id: TopicId,
    pub vote_index: usize,
    #[serde(default)]
    pub created_at: Option<String>,
}

// ── Comments ──

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Comment {
    #[serde(rename = "comment_id")]
    pub id: CommentId,
    pub topic_id: TopicId,
    pub content: String,
    #[serde(rename = "user_id")]
    pub author_id: UserId,
    #[serde(default)]
    pub username: String,
    pub created_at: String,
    #[serde(default)]
    pub like_count: i64,
    #[serde(default)]
    pub has_liked: bool,
    #[serde(default)]
    pub is_deleted: bool,
    #[serde(default)]
    pub replies: Vec<Reply>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reply {
    #[serde(rename = "reply_id")]
    pub id: ReplyId,
    pub comment_id: CommentId,
    #[serde(default)]
    pub parent_reply_id: Option<ReplyId>,
    pub content: String,
    #[serde(rename = "user_id")]
    pub author_id: UserId,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub created_at: String,
    #[serde(default)]
    pub like_count: i64,
    #[serde(default)]
    pub has_liked: bool,
    #[serde(default)]
    pub is_deleted: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewComment {
    pub topic_id: TopicId,
    pub content: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewReply {
    pub comment_id: CommentId,
    pub content: String,
    pub parent_reply_id: Option<ReplyId>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContentUpdate {
    pub content: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn topic_reads_backend_field_names() {
        let topic: Topic = serde_json::from_value(serde_json::json!({
            "topic_id": 7,
            "title": "Tabs or spaces",
            "category": "dev",
            "user_id": 3,
            "created_at": "2025-03-01T10:00:00",
            "vote_options": ["tabs", "spaces"],
            "vote_results": [2, 5],
            "total_vote": 7,
            "has_voted": true,
            "user_vote_index": 1
        }))
        .unwrap();

        assert_eq!(topic.id, 7);
        assert_eq!(topic.options, vec!["tabs", "spaces"]);
        assert_eq!(topic.vote_counts, vec![2, 5]);
        assert_eq!(topic.total_votes, 7);
        assert_eq!(topic.user_vote_index, Some(1));
        assert!(!topic.is_pinned);
        assert_eq!(topic.like_count, 0);
    }

    #[test]
    fn reply_without_parent_serializes_null_parent() {
        let body = serde_json::to_value(NewReply {
            comment_id: 4,
            content: "same".into(),
            parent_reply_id: None,
        })
        .unwrap();
        assert_eq!(body["parent_reply_id"], serde_json::Value::Null);
    }

    #[test]
    fn filter_skips_blank_values() {
        let filter = TopicFilter {
            category: Some(String::new()),
            search: Some("rust".into()),
        };
        assert_eq!(
            filter.pairs(),
            vec![("search".to_string(), "rust".to_string())]
        );
    }

    #[test]
    fn new_topic_requires_two_to_four_options() {
        let mut topic = NewTopic {
            title: "Lunch".into(),
            category: "food".into(),
            vote_options: vec!["pizza".into()],
            description: None,
        };
        assert_eq!(topic.validate(), Err(InvalidTopic::OptionCount(1)));

        topic.vote_options.push("  ".into());
        assert_eq!(topic.validate(), Err(InvalidTopic::EmptyOption(1)));

        topic.vote_options[1] = "ramen".into();
        assert_eq!(topic.validate(), Ok(()));

        topic.title = " ".into();
        assert_eq!(topic.validate(), Err(InvalidTopic::EmptyTitle));
    }

    #[test]
    fn unliking_never_goes_negative() {
        let state = LikeState {
            has_liked: true,
            like_count: 0,
        };
        assert_eq!(state.toggled().like_count, 0);
    }

    #[test]
    fn settle_like_only_moves_when_server_disagrees() {
        let mut reply = Reply {
            id: 1,
            comment_id: 1,
            parent_reply_id: None,
            content: "hi".into(),
            author_id: 2,
            username: "kim".into(),
            created_at: String::new(),
            like_count: 3,
            has_liked: true,
            is_deleted: false,
        };
        reply.settle_like(true);
        assert_eq!(reply.like_count, 3);
        reply.settle_like(false);
        assert_eq!((reply.has_liked, reply.like_count), (false, 2));
    }
}
