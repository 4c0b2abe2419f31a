use std::sync::{Mutex, MutexGuard, PoisonError};

use pickboard_shared::thread::rows;
use pickboard_shared::{
    Affordances, Comment, CommentId, ContentUpdate, Likeable, NewComment, NewReply, Pager, Reply,
    ReplyId, Row, TopicId, UserId,
};
use serde::de::IgnoredAny;

use crate::client::Client;
use crate::error::ApiError;
use crate::likes::{self, LikeStore, LikeTarget};
use crate::notice::Notice;
use crate::reconcile::Reconciler;

pub const COMMENTS_PER_PAGE: usize = 10;

impl Client {
    pub async fn comments_for(&self, topic_id: TopicId) -> Result<Vec<Comment>, ApiError> {
        self.get(&format!("/comments/by-topic/{topic_id}"), vec![]).await
    }

    pub async fn create_comment(&self, comment: &NewComment) -> Result<Comment, ApiError> {
        self.post("/comments", comment).await
    }

    pub async fn update_comment(&self, id: CommentId, content: &str) -> Result<Comment, ApiError> {
        let body = ContentUpdate {
            content: content.to_string(),
        };
        self.put(&format!("/comments/{id}"), &body).await
    }

    pub async fn delete_comment(&self, id: CommentId) -> Result<(), ApiError> {
        self.delete::<IgnoredAny>(&format!("/comments/{id}")).await?;
        Ok(())
    }

    pub async fn create_reply(&self, reply: &NewReply) -> Result<Reply, ApiError> {
        self.post("/replies", reply).await
    }

    pub async fn update_reply(&self, id: ReplyId, content: &str) -> Result<Reply, ApiError> {
        let body = ContentUpdate {
            content: content.to_string(),
        };
        self.put(&format!("/replies/{id}"), &body).await
    }

    pub async fn delete_reply(&self, id: ReplyId) -> Result<(), ApiError> {
        self.delete::<IgnoredAny>(&format!("/replies/{id}")).await?;
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct ThreadState {
    pub comments: Vec<Comment>,
    pub pager: Pager,
}

impl ThreadState {
    /// Comments on the current page.
    pub fn page(&self) -> &[Comment] {
        self.pager.slice(&self.comments)
    }

    pub fn total_pages(&self) -> usize {
        self.pager.total_pages(self.comments.len())
    }

    pub fn rows(&self, viewer: Option<UserId>) -> Vec<Row<'_>> {
        rows(self.page(), viewer)
    }

    fn comment_mut(&mut self, id: CommentId) -> Option<&mut Comment> {
        self.comments.iter_mut().find(|c| c.id == id)
    }

    fn reply_mut(&mut self, id: ReplyId) -> Option<&mut Reply> {
        self.comments.iter_mut().find_map(|c| c.reply_mut(id))
    }

    /// What `viewer` may do with a loaded comment or reply.
    fn affordances(&self, item: LikeTarget, viewer: Option<UserId>) -> Option<Affordances> {
        let (author, deleted) = match item {
            LikeTarget::Comment(id) => {
                let c = self.comments.iter().find(|c| c.id == id)?;
                (c.author_id, c.is_deleted)
            }
            LikeTarget::Reply(id) => {
                let r = self
                    .comments
                    .iter()
                    .flat_map(|c| c.replies.iter())
                    .find(|r| r.id == id)?;
                (r.author_id, r.is_deleted)
            }
            LikeTarget::Topic(_) => return None,
        };
        Some(Affordances::resolve(viewer, author, deleted))
    }
}

impl LikeStore for ThreadState {
    fn likeable(&mut self, target: LikeTarget) -> Option<&mut dyn Likeable> {
        match target {
            LikeTarget::Comment(id) => self.comment_mut(id).map(|c| c as &mut dyn Likeable),
            LikeTarget::Reply(id) => self.reply_mut(id).map(|r| r as &mut dyn Likeable),
            LikeTarget::Topic(_) => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Action {
    Edit,
    Delete,
    Reply,
    Like,
}

/// The comment section under one topic, paged locally.
pub struct CommentThread {
    client: Client,
    topic_id: TopicId,
    state: Mutex<ThreadState>,
    likes: Reconciler<LikeTarget>,
}

impl CommentThread {
    pub fn new(client: Client, topic_id: TopicId) -> Self {
        Self {
            client,
            topic_id,
            state: Mutex::new(ThreadState {
                comments: Vec::new(),
                pager: Pager::new(COMMENTS_PER_PAGE),
            }),
            likes: Reconciler::new(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, ThreadState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn snapshot(&self) -> ThreadState {
        self.lock().clone()
    }

    /// Loads from the first page.
    pub async fn load(&self) -> Result<(), ApiError> {
        self.lock().pager.reset();
        self.refresh().await
    }

    /// Re-fetches and stays on the current page, or the last one if it shrank.
    pub async fn refresh(&self) -> Result<(), ApiError> {
        let result = self.client.comments_for(self.topic_id).await;
        let comments = self.client.reported(result, "Could not load comments")?;
        let mut s = self.lock();
        let page = s.pager.page();
        s.pager.go_to(page, comments.len());
        s.comments = comments;
        tracing::debug!(topic_id = self.topic_id, count = s.comments.len(), page = s.pager.page(), "comments loaded");
        Ok(())
    }

    pub fn go_to_page(&self, page: usize) {
        let mut s = self.lock();
        let total = s.comments.len();
        s.pager.go_to(page, total);
    }

    pub async fn post(&self, content: &str) -> Result<Comment, ApiError> {
        let result = async {
            self.client.session().require_login()?;
            let content = non_blank(content)?;
            let body = NewComment {
                topic_id: self.topic_id,
                content,
            };
            self.client.create_comment(&body).await
        }
        .await;
        let comment = self.client.reported(result, "Could not post the comment")?;
        self.client.notify(Notice::success("Comment posted."));
        let _ = self.refresh().await;
        Ok(comment)
    }

    pub async fn edit(&self, id: CommentId, content: &str) -> Result<(), ApiError> {
        let result = async {
            self.allowed(LikeTarget::Comment(id), Action::Edit)?;
            let content = non_blank(content)?;
            self.client.update_comment(id, &content).await
        }
        .await;
        let updated = self.client.reported(result, "Could not edit the comment")?;
        if let Some(comment) = self.lock().comment_mut(id) {
            comment.content = updated.content;
        }
        self.client.notify(Notice::success("Comment updated."));
        let _ = self.refresh().await;
        Ok(())
    }

    pub async fn remove(&self, id: CommentId) -> Result<(), ApiError> {
        let result = async {
            self.allowed(LikeTarget::Comment(id), Action::Delete)?;
            self.client.delete_comment(id).await
        }
        .await;
        self.client.reported(result, "Could not delete the comment")?;
        self.client.notify(Notice::success("Comment deleted."));
        let _ = self.refresh().await;
        Ok(())
    }

    /// Replies to a comment, or to one of its replies when `parent` is set.
    pub async fn reply(
        &self,
        comment_id: CommentId,
        parent: Option<ReplyId>,
        content: &str,
    ) -> Result<Reply, ApiError> {
        let result = async {
            let target = parent.map_or(LikeTarget::Comment(comment_id), LikeTarget::Reply);
            self.allowed(target, Action::Reply)?;
            let content = non_blank(content)?;
            let body = NewReply {
                comment_id,
                content,
                parent_reply_id: parent,
            };
            self.client.create_reply(&body).await
        }
        .await;
        let reply = self.client.reported(result, "Could not post the reply")?;
        self.client.notify(Notice::success("Reply posted."));
        let _ = self.refresh().await;
        Ok(reply)
    }

    pub async fn edit_reply(&self, id: ReplyId, content: &str) -> Result<(), ApiError> {
        let result = async {
            self.allowed(LikeTarget::Reply(id), Action::Edit)?;
            let content = non_blank(content)?;
            self.client.update_reply(id, &content).await
        }
        .await;
        let updated = self.client.reported(result, "Could not edit the reply")?;
        if let Some(reply) = self.lock().reply_mut(id) {
            reply.content = updated.content;
        }
        self.client.notify(Notice::success("Reply updated."));
        let _ = self.refresh().await;
        Ok(())
    }

    pub async fn remove_reply(&self, id: ReplyId) -> Result<(), ApiError> {
        let result = async {
            self.allowed(LikeTarget::Reply(id), Action::Delete)?;
            self.client.delete_reply(id).await
        }
        .await;
        self.client.reported(result, "Could not delete the reply")?;
        self.client.notify(Notice::success("Reply deleted."));
        let _ = self.refresh().await;
        Ok(())
    }

    /// Deleted rows can't be liked; nothing is sent for them.
    pub async fn toggle_like(&self, target: LikeTarget) -> Result<bool, ApiError> {
        if let Err(err) = self.allowed(target, Action::Like) {
            self.client.report(&err, "Could not update the like");
            return Err(err);
        }
        likes::toggle(&self.client, &self.likes, &self.state, target).await
    }

    /// Rows without an affordance for `action` can't be acted on.
    fn allowed(&self, item: LikeTarget, action: Action) -> Result<(), ApiError> {
        self.client.session().require_login()?;
        let viewer = self.client.session().user_id();
        let affordances = self
            .lock()
            .affordances(item, viewer)
            .ok_or_else(|| ApiError::NotFound(format!("{item} is not loaded")))?;
        let ok = match action {
            Action::Edit => affordances.edit,
            Action::Delete => affordances.delete,
            Action::Reply => affordances.reply,
            Action::Like => affordances.like,
        };
        if ok {
            Ok(())
        } else {
            Err(ApiError::Forbidden(format!("You can't do that to this {item}.")))
        }
    }
}

fn non_blank(content: &str) -> Result<String, ApiError> {
    let trimmed = content.trim();
    if trimmed.is_empty() {
        return Err(ApiError::Invalid("Write something first.".into()));
    }
    Ok(trimmed.to_string())
}
