use std::fmt;
use std::sync::Mutex;

use pickboard_shared::{CommentId, Likeable, ReplyId, TopicId};

use crate::client::Client;
use crate::error::ApiError;
use crate::notice::Notice;
use crate::reconcile::Reconciler;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LikeTarget {
    Topic(TopicId),
    Comment(CommentId),
    Reply(ReplyId),
}

impl LikeTarget {
    fn path(self) -> String {
        match self {
            LikeTarget::Topic(id) => format!("/likes/topic/{id}"),
            LikeTarget::Comment(id) => format!("/likes/comment/{id}"),
            LikeTarget::Reply(id) => format!("/likes/reply/{id}"),
        }
    }
}

impl fmt::Display for LikeTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LikeTarget::Topic(_) => f.write_str("topic"),
            LikeTarget::Comment(_) => f.write_str("comment"),
            LikeTarget::Reply(_) => f.write_str("reply"),
        }
    }
}

/// State that holds likeable items.
pub trait LikeStore {
    fn likeable(&mut self, target: LikeTarget) -> Option<&mut dyn Likeable>;
}

impl Client {
    /// Flips the like on the server. Returns whether the item is now liked.
    pub async fn toggle_like(&self, target: LikeTarget) -> Result<bool, ApiError> {
        self.put_empty(&target.path()).await
    }
}

/// Optimistic like toggle: flips flag and counter at once, lines the flag up
/// with the server's answer, or restores the exact previous pair on failure.
pub(crate) async fn toggle<S: LikeStore>(
    client: &Client,
    reconciler: &Reconciler<LikeTarget>,
    state: &Mutex<S>,
    target: LikeTarget,
) -> Result<bool, ApiError> {
    if let Err(err) = client.session().require_login() {
        client.report(&err, "Could not update the like");
        return Err(err);
    }

    let missing = || ApiError::NotFound(format!("{target} is not loaded"));
    let result = reconciler
        .run(
            target,
            state,
            |s| Ok(s.likeable(target).ok_or_else(missing)?.toggle_like()),
            |_| client.toggle_like(target),
            |s, liked| {
                if let Some(item) = s.likeable(target) {
                    item.settle_like(*liked);
                }
            },
            |s, before| {
                if let Some(item) = s.likeable(target) {
                    item.set_like_state(before);
                }
            },
        )
        .await;

    match &result {
        Ok(true) => client.notify(Notice::success(format!("Liked the {target}."))),
        Ok(false) => client.notify(Notice::success(format!("Removed your like from the {target}."))),
        Err(err) => client.report(err, "Could not update the like"),
    }
    result
}
