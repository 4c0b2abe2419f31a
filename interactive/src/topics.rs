use std::sync::{Mutex, MutexGuard, PoisonError};

use pickboard_shared::{
    Board, Likeable, NewTopic, Pager, SeriesPoint, TimeFrame, Topic, TopicFilter, TopicId,
    TopicQuery, TopicSort, VoteReceipt,
};

use crate::client::Client;
use crate::error::ApiError;
use crate::likes::{self, LikeStore, LikeTarget};
use crate::notice::Notice;
use crate::reconcile::Reconciler;
use crate::votes::{self, TopicStore};

pub const TOPICS_PER_PAGE: usize = 12;

impl Client {
    pub async fn list_topics(&self, query: &TopicQuery) -> Result<Vec<Topic>, ApiError> {
        self.get("/topics", query.pairs()).await
    }

    pub async fn count_topics(&self, filter: &TopicFilter) -> Result<usize, ApiError> {
        self.get("/topics/count", filter.pairs()).await
    }

    pub async fn topic(&self, id: TopicId) -> Result<Topic, ApiError> {
        self.get(&format!("/topics/{id}"), vec![]).await
    }

    pub async fn create_topic(&self, topic: &NewTopic) -> Result<Topic, ApiError> {
        topic.validate()?;
        self.post("/topics", topic).await
    }

    pub async fn delete_topic(&self, id: TopicId) -> Result<serde_json::Value, ApiError> {
        self.delete(&format!("/topics/{id}")).await
    }

    pub async fn pin_topic(&self, id: TopicId) -> Result<bool, ApiError> {
        self.post_empty(&format!("/topics/{id}/pin")).await
    }

    pub async fn unpin_topic(&self, id: TopicId) -> Result<bool, ApiError> {
        self.delete(&format!("/topics/{id}/pin")).await
    }
}

fn lock<S>(state: &Mutex<S>) -> MutexGuard<'_, S> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

fn not_loaded(id: TopicId) -> ApiError {
    ApiError::NotFound(format!("topic {id} is not loaded"))
}

// ── Topic list ──

#[derive(Debug, Clone)]
pub struct BoardState {
    pub board: Board,
    pub pager: Pager,
    pub sort: TopicSort,
    pub filter: TopicFilter,
    /// Matching topics on the server, across all pages.
    pub total: usize,
}

impl BoardState {
    pub fn total_pages(&self) -> usize {
        self.pager.total_pages(self.total)
    }

    fn query(&self) -> TopicQuery {
        TopicQuery {
            sort: self.sort,
            limit: self.pager.per_page(),
            offset: self.pager.offset(),
            filter: self.filter.clone(),
        }
    }
}

impl TopicStore for BoardState {
    fn topic_mut(&mut self, id: TopicId) -> Option<&mut Topic> {
        self.board.get_mut(id)
    }
}

/// One page of the topic list, pinned topics first.
pub struct TopicBoard {
    client: Client,
    state: Mutex<BoardState>,
    mutations: Reconciler<TopicId>,
}

impl TopicBoard {
    pub fn new(client: Client) -> Self {
        Self {
            client,
            state: Mutex::new(BoardState {
                board: Board::default(),
                pager: Pager::new(TOPICS_PER_PAGE),
                sort: TopicSort::default(),
                filter: TopicFilter::default(),
                total: 0,
            }),
            mutations: Reconciler::new(),
        }
    }

    pub fn snapshot(&self) -> BoardState {
        lock(&self.state).clone()
    }

    pub fn topics(&self) -> Vec<Topic> {
        lock(&self.state).board.topics().cloned().collect()
    }

    pub fn is_pending(&self, id: TopicId) -> bool {
        self.mutations.is_pending(&id)
    }

    /// Fetches the current page and the total count together.
    pub async fn load(&self) -> Result<(), ApiError> {
        let (query, filter) = {
            let s = lock(&self.state);
            (s.query(), s.filter.clone())
        };
        let (topics, total) = tokio::join!(
            self.client.list_topics(&query),
            self.client.count_topics(&filter)
        );
        let loaded = topics.and_then(|topics| Ok((topics, total?)));
        let (topics, total) = self.client.reported(loaded, "Could not load topics")?;

        tracing::debug!(count = topics.len(), total, offset = query.offset, "topics loaded");
        let mut s = lock(&self.state);
        s.board = Board::new(topics);
        s.total = total;
        Ok(())
    }

    pub async fn go_to_page(&self, page: usize) -> Result<(), ApiError> {
        // Clamping needs the count, which an unloaded board doesn't have yet.
        let filter = {
            let s = lock(&self.state);
            (s.total == 0).then(|| s.filter.clone())
        };
        if let Some(filter) = filter {
            let total = self.client.count_topics(&filter).await;
            lock(&self.state).total = self.client.reported(total, "Could not load topics")?;
        }
        {
            let mut s = lock(&self.state);
            let total = s.total;
            s.pager.go_to(page, total);
        }
        self.load().await
    }

    pub async fn set_sort(&self, sort: TopicSort) -> Result<(), ApiError> {
        {
            let mut s = lock(&self.state);
            s.sort = sort;
            s.pager.reset();
        }
        self.load().await
    }

    /// New filters always start again from the first page.
    pub async fn set_filter(&self, filter: TopicFilter) -> Result<(), ApiError> {
        {
            let mut s = lock(&self.state);
            s.filter = filter;
            s.pager.reset();
        }
        self.load().await
    }

    /// Flips the pin right away and moves the topic into place; a failed call
    /// puts it back exactly where it was. Returns the new pinned flag.
    pub async fn toggle_pin(&self, id: TopicId) -> Result<bool, ApiError> {
        if let Err(err) = self.client.session().require_login() {
            self.client.report(&err, "Could not update the pin");
            return Err(err);
        }

        let client = &self.client;
        let result = self
            .mutations
            .run(
                id,
                &self.state,
                |s| {
                    let was_pinned = s.board.get(id).ok_or_else(|| not_loaded(id))?.is_pinned;
                    s.board.set_pinned(id, !was_pinned);
                    Ok(was_pinned)
                },
                |was_pinned| {
                    let was_pinned = *was_pinned;
                    async move {
                        if was_pinned {
                            client.unpin_topic(id).await
                        } else {
                            client.pin_topic(id).await
                        }
                    }
                },
                |_, _| {},
                |s, was_pinned| {
                    s.board.set_pinned(id, was_pinned);
                },
            )
            .await;

        match result {
            Ok(_) => {
                let pinned = lock(&self.state)
                    .board
                    .get(id)
                    .is_some_and(|t| t.is_pinned);
                let message = if pinned { "Topic pinned." } else { "Topic unpinned." };
                self.client.notify(Notice::success(message));
                Ok(pinned)
            }
            Err(err) => {
                self.client.report(&err, "Could not update the pin");
                Err(err)
            }
        }
    }

    pub async fn vote(&self, id: TopicId, index: usize) -> Result<Option<VoteReceipt>, ApiError> {
        votes::cast(&self.client, &self.mutations, &self.state, id, index).await
    }

    /// Creates a topic and shows it at the top of the list.
    pub async fn create(&self, topic: &NewTopic) -> Result<Topic, ApiError> {
        let result = self.client.create_topic(topic).await;
        let created = self.client.reported(result, "Could not create the topic")?;
        {
            let mut s = lock(&self.state);
            s.board.insert_front(created.clone());
            s.total += 1;
        }
        self.client.notify(Notice::success("Topic created."));
        Ok(created)
    }

    pub async fn delete(&self, id: TopicId) -> Result<(), ApiError> {
        let result = self.client.delete_topic(id).await;
        self.client.reported(result, "Could not delete the topic")?;
        {
            let mut s = lock(&self.state);
            if s.board.remove(id).is_some() {
                s.total = s.total.saturating_sub(1);
            }
        }
        self.client.notify(Notice::success("Topic deleted."));
        Ok(())
    }
}

// ── Single topic ──

#[derive(Debug, Clone, Default)]
pub struct PageState {
    pub topic: Option<Topic>,
    pub frame: TimeFrame,
    pub series: Vec<SeriesPoint>,
}

impl TopicStore for PageState {
    fn topic_mut(&mut self, id: TopicId) -> Option<&mut Topic> {
        self.topic.as_mut().filter(|t| t.id == id)
    }
}

impl LikeStore for PageState {
    fn likeable(&mut self, target: LikeTarget) -> Option<&mut dyn Likeable> {
        match target {
            LikeTarget::Topic(id) => self.topic_mut(id).map(|t| t as &mut dyn Likeable),
            _ => None,
        }
    }
}

/// A topic with its vote chart.
pub struct TopicPage {
    client: Client,
    id: TopicId,
    state: Mutex<PageState>,
    votes: Reconciler<TopicId>,
    likes: Reconciler<LikeTarget>,
}

impl TopicPage {
    pub fn new(client: Client, id: TopicId) -> Self {
        Self {
            client,
            id,
            state: Mutex::new(PageState::default()),
            votes: Reconciler::new(),
            likes: Reconciler::new(),
        }
    }

    pub fn id(&self) -> TopicId {
        self.id
    }

    pub fn snapshot(&self) -> PageState {
        lock(&self.state).clone()
    }

    pub fn topic(&self) -> Option<Topic> {
        lock(&self.state).topic.clone()
    }

    pub async fn load(&self) -> Result<Topic, ApiError> {
        let result = self.client.topic(self.id).await;
        let topic = self.client.reported(result, "Could not load the topic")?;
        lock(&self.state).topic = Some(topic.clone());
        Ok(topic)
    }

    /// Reloads the chart for `frame`. Needs the topic loaded first.
    pub async fn load_series(&self, frame: TimeFrame) -> Result<Vec<SeriesPoint>, ApiError> {
        let options = {
            let s = lock(&self.state);
            s.topic.as_ref().map(|t| t.options.len())
        };
        let result = match options {
            Some(options) => self.client.vote_series(self.id, frame, options).await,
            None => Err(not_loaded(self.id)),
        };
        let series = self.client.reported(result, "Could not load the vote history")?;
        let mut s = lock(&self.state);
        s.frame = frame;
        s.series = series.clone();
        Ok(series)
    }

    pub async fn vote(&self, index: usize) -> Result<Option<VoteReceipt>, ApiError> {
        let receipt = votes::cast(&self.client, &self.votes, &self.state, self.id, index).await?;
        if receipt.is_some() {
            let frame = lock(&self.state).frame;
            // The chart is secondary; a failure here is already reported.
            let _ = self.load_series(frame).await;
        }
        Ok(receipt)
    }

    pub async fn toggle_like(&self) -> Result<bool, ApiError> {
        likes::toggle(
            &self.client,
            &self.likes,
            &self.state,
            LikeTarget::Topic(self.id),
        )
        .await
    }
}
