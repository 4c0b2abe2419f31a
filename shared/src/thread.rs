//! Comment threads as they are rendered: comments, their replies, and which
//! actions each row offers to the current viewer.

use std::collections::HashMap;

use crate::{Comment, Reply, ReplyId, UserId};

/// Actions a row offers. Deleted rows offer none, whoever is looking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Affordances {
    pub edit: bool,
    pub delete: bool,
    pub reply: bool,
    pub like: bool,
}

impl Affordances {
    pub fn resolve(viewer: Option<UserId>, author_id: UserId, is_deleted: bool) -> Self {
        if is_deleted {
            return Self::default();
        }
        let signed_in = viewer.is_some();
        let owner = viewer == Some(author_id);
        Self {
            edit: owner,
            delete: owner,
            reply: signed_in,
            like: signed_in,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RowKind<'a> {
    Comment(&'a Comment),
    Reply(&'a Reply),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Row<'a> {
    pub kind: RowKind<'a>,
    /// 0 for comments, 1 for replies, 2 for replies to replies.
    pub depth: u8,
    pub affordances: Affordances,
}

impl Comment {
    /// Replies in display order. Replies to replies are flattened one level:
    /// each one is listed under the reply that started its chain.
    pub fn threaded_replies(&self) -> Vec<(&Reply, bool)> {
        let by_id: HashMap<ReplyId, &Reply> = self.replies.iter().map(|r| (r.id, r)).collect();

        let root_of = |reply: &Reply| -> ReplyId {
            let mut current = reply;
            let mut hops = 0;
            while let Some(parent) = current.parent_reply_id.and_then(|p| by_id.get(&p).copied()) {
                current = parent;
                hops += 1;
                // cycle in bad data
                if hops > self.replies.len() {
                    break;
                }
            }
            current.id
        };

        let mut order: Vec<ReplyId> = Vec::new();
        let mut groups: HashMap<ReplyId, Vec<&Reply>> = HashMap::new();
        for reply in &self.replies {
            let root = root_of(reply);
            if !groups.contains_key(&root) {
                order.push(root);
            }
            groups.entry(root).or_default().push(reply);
        }

        let mut out = Vec::with_capacity(self.replies.len());
        for root in order {
            let Some(group) = groups.remove(&root) else {
                continue;
            };
            // The root itself may sit later in the list than its children.
            if let Some(root_reply) = group.iter().find(|r| r.id == root) {
                out.push((*root_reply, false));
            }
            out.extend(group.into_iter().filter(|r| r.id != root).map(|r| (r, true)));
        }
        out
    }

    pub fn reply_mut(&mut self, id: ReplyId) -> Option<&mut Reply> {
        self.replies.iter_mut().find(|r| r.id == id)
    }
}

/// Flattens comments and their replies into renderable rows.
pub fn rows(comments: &[Comment], viewer: Option<UserId>) -> Vec<Row<'_>> {
    let mut rows = Vec::new();
    for comment in comments {
        rows.push(Row {
            kind: RowKind::Comment(comment),
            depth: 0,
            affordances: Affordances::resolve(viewer, comment.author_id, comment.is_deleted),
        });
        for (reply, nested) in comment.threaded_replies() {
            rows.push(Row {
                kind: RowKind::Reply(reply),
                depth: if nested { 2 } else { 1 },
                affordances: Affordances::resolve(viewer, reply.author_id, reply.is_deleted),
            });
        }
    }
    rows
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn reply(id: ReplyId, parent: Option<ReplyId>, author: UserId) -> Reply {
        Reply {
            id,
            comment_id: 1,
            parent_reply_id: parent,
            content: format!("reply {id}"),
            author_id: author,
            username: format!("user{author}"),
            created_at: String::new(),
            like_count: 0,
            has_liked: false,
            is_deleted: false,
        }
    }

    fn comment(replies: Vec<Reply>) -> Comment {
        Comment {
            id: 1,
            topic_id: 1,
            content: "first".into(),
            author_id: 10,
            username: "author".into(),
            created_at: String::new(),
            like_count: 0,
            has_liked: false,
            is_deleted: false,
            replies,
        }
    }

    fn ids(c: &Comment) -> Vec<(ReplyId, bool)> {
        c.threaded_replies()
            .into_iter()
            .map(|(r, nested)| (r.id, nested))
            .collect()
    }

    #[test]
    fn nested_replies_follow_their_root() {
        let c = comment(vec![
            reply(1, None, 2),
            reply(2, None, 3),
            reply(3, Some(1), 4),
            reply(4, Some(3), 5),
        ]);
        assert_eq!(ids(&c), vec![(1, false), (3, true), (4, true), (2, false)]);
    }

    #[test]
    fn orphaned_parent_is_treated_as_root() {
        let c = comment(vec![reply(5, Some(99), 2)]);
        assert_eq!(ids(&c), vec![(5, false)]);
    }

    #[test]
    fn parent_cycle_terminates() {
        let c = comment(vec![reply(1, Some(2), 2), reply(2, Some(1), 3)]);
        assert_eq!(c.threaded_replies().len(), 2);
    }

    #[test]
    fn owner_gets_edit_and_delete() {
        let a = Affordances::resolve(Some(10), 10, false);
        assert_eq!(
            a,
            Affordances {
                edit: true,
                delete: true,
                reply: true,
                like: true
            }
        );
        let other = Affordances::resolve(Some(11), 10, false);
        assert!(!other.edit && !other.delete && other.reply && other.like);
        assert_eq!(Affordances::resolve(None, 10, false), Affordances::default());
    }

    #[test]
    fn deleted_rows_offer_nothing_even_to_owner() {
        let mut c = comment(vec![reply(1, None, 10)]);
        c.is_deleted = true;
        c.replies[0].is_deleted = true;

        for row in rows(std::slice::from_ref(&c), Some(10)) {
            assert_eq!(row.affordances, Affordances::default());
        }
    }

    #[test]
    fn rows_carry_depth() {
        let c = comment(vec![reply(1, None, 2), reply(2, Some(1), 3)]);
        let depths: Vec<u8> = rows(std::slice::from_ref(&c), None)
            .iter()
            .map(|r| r.depth)
            .collect();
        assert_eq!(depths, vec![0, 1, 2]);
    }
}
