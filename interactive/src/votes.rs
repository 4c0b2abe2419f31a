use std::sync::Mutex;

use pickboard_shared::stats::{series_from_wire, WireSeries};
use pickboard_shared::{
    CastVote, SeriesPoint, TimeFrame, Topic, TopicId, VoteReceipt, VoteRejected,
};

use crate::client::Client;
use crate::error::ApiError;
use crate::notice::Notice;
use crate::reconcile::Reconciler;

/// State that holds topics a vote can land on.
pub trait TopicStore {
    fn topic_mut(&mut self, id: TopicId) -> Option<&mut Topic>;
}

impl Client {
    /// `POST /votes`. The server refuses a second vote with 403 or 409.
    pub async fn submit_vote(&self, vote: &CastVote) -> Result<VoteReceipt, ApiError> {
        self.post("/votes", vote).await.map_err(|err| match err {
            ApiError::Forbidden(_) | ApiError::Status { status: 409, .. } => ApiError::AlreadyVoted,
            other => other,
        })
    }

    /// Vote history bucketed for `frame`, one tally per option.
    pub async fn vote_series(
        &self,
        topic_id: TopicId,
        frame: TimeFrame,
        options: usize,
    ) -> Result<Vec<SeriesPoint>, ApiError> {
        let query = vec![
            ("interval".to_string(), frame.interval().to_string()),
            ("time_range".to_string(), frame.time_range().to_string()),
        ];
        let wire: WireSeries = self.get(&format!("/votes/topic/{topic_id}"), query).await?;
        Ok(series_from_wire(wire, options)?)
    }
}

/// Casts a vote with the tally updated up front.
///
/// Returns `Ok(None)` without touching the network when the viewer has
/// already voted on the topic, including a vote that settled while this one
/// waited its turn.
pub(crate) async fn cast<S: TopicStore>(
    client: &Client,
    reconciler: &Reconciler<TopicId>,
    state: &Mutex<S>,
    topic_id: TopicId,
    index: usize,
) -> Result<Option<VoteReceipt>, ApiError> {
    let already_voted = {
        let mut s = state.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        s.topic_mut(topic_id).map(|topic| topic.has_voted)
    };
    let already_voted = match already_voted {
        Some(voted) => voted,
        None => {
            let err = ApiError::NotFound(format!("topic {topic_id} is not loaded"));
            client.report(&err, "Could not submit the vote");
            return Err(err);
        }
    };
    if already_voted {
        tracing::debug!(topic_id, "already voted, ignoring");
        return Ok(None);
    }
    if let Err(err) = client.session().require_login() {
        client.report(&err, "Could not submit the vote");
        return Err(err);
    }

    let vote = CastVote {
        topic_id,
        vote_index: index,
    };
    let result = reconciler
        .run(
            topic_id,
            state,
            |s| {
                let topic = s
                    .topic_mut(topic_id)
                    .ok_or_else(|| ApiError::NotFound(format!("topic {topic_id} is not loaded")))?;
                match topic.record_vote(index) {
                    Ok(undo) => Ok(Some(undo)),
                    Err(VoteRejected::AlreadyVoted) => Ok(None),
                    Err(err) => Err(err.into()),
                }
            },
            |undo| {
                let send = undo.is_some();
                let vote = &vote;
                async move {
                    if send {
                        client.submit_vote(vote).await.map(Some)
                    } else {
                        Ok(None)
                    }
                }
            },
            |_, _| {},
            |s, undo| {
                if let (Some(topic), Some(undo)) = (s.topic_mut(topic_id), undo) {
                    topic.undo_vote(undo);
                }
            },
        )
        .await;

    match result {
        Ok(None) => {
            tracing::debug!(topic_id, "vote settled while waiting, ignoring");
            Ok(None)
        }
        Ok(Some(receipt)) => {
            client.notify(Notice::success("Vote recorded."));
            Ok(Some(receipt))
        }
        Err(err) => {
            client.report(&err, "Could not submit the vote");
            Err(err)
        }
    }
}
