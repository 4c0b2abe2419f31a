//! Topic list ordering and vote tallies.
//!
//! A [`Board`] remembers the order topics arrived in and always lists pinned
//! topics first. Within each group the arrival order is kept, so toggling a
//! pin and toggling it back restores the exact previous ordering.

use crate::{Topic, TopicId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum VoteRejected {
    #[error("already voted on this topic")]
    AlreadyVoted,
    #[error("option {index} is out of range for {options} options")]
    OutOfRange { index: usize, options: usize },
}

/// Tallies as they were before [`Topic::record_vote`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VoteUndo {
    vote_counts: Vec<i64>,
    total_votes: i64,
    has_voted: bool,
    user_vote_index: Option<usize>,
}

impl Topic {
    /// Whether `index` may be voted for right now.
    pub fn check_vote(&self, index: usize) -> Result<(), VoteRejected> {
        if self.has_voted {
            return Err(VoteRejected::AlreadyVoted);
        }
        if index >= self.options.len() {
            return Err(VoteRejected::OutOfRange {
                index,
                options: self.options.len(),
            });
        }
        Ok(())
    }

    pub fn record_vote(&mut self, index: usize) -> Result<VoteUndo, VoteRejected> {
        self.check_vote(index)?;
        let undo = VoteUndo {
            vote_counts: self.vote_counts.clone(),
            total_votes: self.total_votes,
            has_voted: self.has_voted,
            user_vote_index: self.user_vote_index,
        };
        if self.vote_counts.len() < self.options.len() {
            self.vote_counts.resize(self.options.len(), 0);
        }
        self.vote_counts[index] += 1;
        self.total_votes += 1;
        self.has_voted = true;
        self.user_vote_index = Some(index);
        Ok(undo)
    }

    pub fn undo_vote(&mut self, undo: VoteUndo) {
        self.vote_counts = undo.vote_counts;
        self.total_votes = undo.total_votes;
        self.has_voted = undo.has_voted;
        self.user_vote_index = undo.user_vote_index;
    }

    /// Tallies sum to the total and the user's choice is set only after voting.
    pub fn tally_is_consistent(&self) -> bool {
        let sum: i64 = self.vote_counts.iter().sum();
        let choice_ok = match (self.has_voted, self.user_vote_index) {
            (true, Some(i)) => i < self.options.len(),
            (false, None) => true,
            _ => false,
        };
        sum == self.total_votes && choice_ok
    }

    /// Share of the vote for `index`, rounded to a whole percent.
    pub fn percent(&self, index: usize) -> u32 {
        let count = self.vote_counts.get(index).copied().unwrap_or(0);
        if self.total_votes <= 0 {
            return 0;
        }
        ((count as f64 / self.total_votes as f64) * 100.0).round() as u32
    }
}

#[derive(Debug, Clone)]
struct Entry {
    rank: usize,
    topic: Topic,
}

#[derive(Debug, Clone, Default)]
pub struct Board {
    entries: Vec<Entry>,
}

impl Board {
    pub fn new(topics: Vec<Topic>) -> Self {
        let mut board = Self {
            entries: topics
                .into_iter()
                .enumerate()
                .map(|(rank, topic)| Entry { rank, topic })
                .collect(),
        };
        board.sort();
        board
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn topics(&self) -> impl Iterator<Item = &Topic> {
        self.entries.iter().map(|e| &e.topic)
    }

    pub fn ids(&self) -> Vec<TopicId> {
        self.topics().map(|t| t.id).collect()
    }

    pub fn get(&self, id: TopicId) -> Option<&Topic> {
        self.topics().find(|t| t.id == id)
    }

    /// Mutable access for tallies and likes. Pin changes go through
    /// [`Board::set_pinned`] so the ordering stays correct.
    pub fn get_mut(&mut self, id: TopicId) -> Option<&mut Topic> {
        self.entries
            .iter_mut()
            .find(|e| e.topic.id == id)
            .map(|e| &mut e.topic)
    }

    /// Sets the pin flag and re-sorts. Returns the previous flag.
    pub fn set_pinned(&mut self, id: TopicId, pinned: bool) -> Option<bool> {
        let topic = self.get_mut(id)?;
        let previous = std::mem::replace(&mut topic.is_pinned, pinned);
        self.sort();
        Some(previous)
    }

    /// Puts a freshly created topic ahead of everything else in its group.
    pub fn insert_front(&mut self, topic: Topic) {
        for entry in &mut self.entries {
            entry.rank += 1;
        }
        self.entries.push(Entry { rank: 0, topic });
        self.sort();
    }

    pub fn remove(&mut self, id: TopicId) -> Option<Topic> {
        let pos = self.entries.iter().position(|e| e.topic.id == id)?;
        Some(self.entries.remove(pos).topic)
    }

    fn sort(&mut self) {
        self.entries.sort_by_key(|e| (!e.topic.is_pinned, e.rank));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn topic(id: TopicId, pinned: bool) -> Topic {
        Topic {
            id,
            title: format!("topic {id}"),
            category: "free".into(),
            description: None,
            user_id: 1,
            created_at: "2025-01-01T00:00:00".into(),
            options: vec!["yes".into(), "no".into(), "maybe".into()],
            vote_counts: vec![3, 1, 0],
            total_votes: 4,
            has_voted: false,
            user_vote_index: None,
            like_count: 0,
            has_liked: false,
            is_pinned: pinned,
            comment_count: 0,
        }
    }

    #[test]
    fn pinned_topics_come_first_in_arrival_order() {
        // A, B, C, D with B and D pinned
        let board = Board::new(vec![
            topic(1, false),
            topic(2, true),
            topic(3, false),
            topic(4, true),
        ]);
        assert_eq!(board.ids(), vec![2, 4, 1, 3]);
    }

    #[test]
    fn pin_then_unpin_restores_order() {
        let mut board = Board::new(vec![topic(1, false), topic(2, true), topic(3, false)]);
        let before = board.ids();

        assert_eq!(board.set_pinned(3, true), Some(false));
        assert_eq!(board.ids(), vec![2, 3, 1]);

        board.set_pinned(3, false);
        assert_eq!(board.ids(), before);
    }

    #[test]
    fn pinning_unknown_topic_is_none() {
        let mut board = Board::new(vec![topic(1, false)]);
        assert_eq!(board.set_pinned(9, true), None);
    }

    #[test]
    fn inserted_topic_leads_unpinned_group() {
        let mut board = Board::new(vec![topic(1, true), topic(2, false)]);
        board.insert_front(topic(3, false));
        assert_eq!(board.ids(), vec![1, 3, 2]);
        assert_eq!(board.remove(3).map(|t| t.id), Some(3));
        assert_eq!(board.ids(), vec![1, 2]);
    }

    #[test]
    fn vote_bumps_only_the_chosen_option() {
        let mut t = topic(1, false);
        t.record_vote(1).unwrap();

        assert_eq!(t.vote_counts, vec![3, 2, 0]);
        assert_eq!(t.total_votes, 5);
        assert!(t.has_voted);
        assert_eq!(t.user_vote_index, Some(1));
        assert!(t.tally_is_consistent());
    }

    #[test]
    fn second_vote_is_rejected() {
        let mut t = topic(1, false);
        t.record_vote(0).unwrap();
        assert_eq!(t.record_vote(2), Err(VoteRejected::AlreadyVoted));
        assert_eq!(t.total_votes, 5);
    }

    #[test]
    fn out_of_range_vote_is_rejected() {
        let mut t = topic(1, false);
        assert_eq!(
            t.record_vote(3),
            Err(VoteRejected::OutOfRange {
                index: 3,
                options: 3
            })
        );
    }

    #[test]
    fn undo_restores_tallies() {
        let mut t = topic(1, false);
        t.vote_counts.clear();
        t.total_votes = 0;
        let before = t.clone();

        let undo = t.record_vote(2).unwrap();
        assert_eq!(t.vote_counts, vec![0, 0, 1]);
        t.undo_vote(undo);
        assert_eq!(t, before);
    }

    #[test]
    fn percent_rounds_and_handles_empty_topics() {
        let t = topic(1, false);
        assert_eq!(t.percent(0), 75);
        assert_eq!(t.percent(1), 25);
        assert_eq!(t.percent(5), 0);

        let mut empty = topic(2, false);
        empty.vote_counts = vec![0, 0, 0];
        empty.total_votes = 0;
        assert_eq!(empty.percent(0), 0);
    }
}
