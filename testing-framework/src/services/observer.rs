// Topic message observer
//
// idle -> subscribed -> (receiving)* -> observed
//
// A spawned collector drains the subscription into an append-only log.
// Messages are keyed by sequence number, so a re-subscription that replays
// history never duplicates what the log already holds. The log size is
// published on a watch channel that `await_messages` races against the
// observation window.

use ledger_common::{LedgerError, TopicId};
use parking_lot::Mutex;
use std::{sync::Arc, time::Duration};
use tokio::{sync::watch, task::JoinHandle};

use crate::{client::LedgerClient, orchestrator::Clock, rpc::TopicMessage};

struct Generation {
    topic_id: TopicId,
    log: Arc<Mutex<Vec<TopicMessage>>>,
    count: Arc<watch::Sender<usize>>,
    collector: Option<JoinHandle<()>>,
}

/// Outcome of an observation window
#[derive(Debug, Clone)]
pub struct Observation {
    pub messages: Vec<TopicMessage>,
    pub expected: usize,
    pub waited: Duration,
    pub timed_out: bool,
}

impl Observation {
    /// Messages decoded as text, in sequence order
    pub fn texts(&self) -> Vec<String> {
        self.messages.iter().map(TopicMessage::text).collect()
    }

    pub fn last_text(&self) -> Option<String> {
        self.messages.last().map(TopicMessage::text)
    }

    /// Turn a short observation into an `ObservationTimeout`
    pub fn into_result(self) -> Result<Vec<TopicMessage>, LedgerError> {
        if self.timed_out {
            return Err(LedgerError::ObservationTimeout {
                condition: format!(
                    "{} topic messages (received {})",
                    self.expected,
                    self.messages.len()
                ),
                waited: self.waited,
            });
        }
        Ok(self.messages)
    }
}

pub struct MessageObserver {
    clock: Arc<dyn Clock>,
    current: Option<Generation>,
}

impl MessageObserver {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            current: None,
        }
    }

    pub fn topic_id(&self) -> Option<TopicId> {
        self.current.as_ref().map(|generation| generation.topic_id)
    }

    /// Open a subscription on `topic_id`
    ///
    /// Returns once the ledger registered the subscriber, so anything
    /// published afterwards is delivered. Subscribing to another topic
    /// starts a fresh log.
    pub async fn subscribe(
        &mut self,
        client: &LedgerClient,
        topic_id: &TopicId,
    ) -> Result<(), LedgerError> {
        let mut subscription = client.rpc().subscribe_topic(topic_id).await?;

        let generation = match self.current.take() {
            Some(mut previous) if previous.topic_id == *topic_id => {
                if let Some(collector) = previous.collector.take() {
                    collector.abort();
                }
                previous
            }
            previous => {
                if let Some(collector) = previous.and_then(|mut p| p.collector.take()) {
                    collector.abort();
                }
                let (count, _) = watch::channel(0);
                Generation {
                    topic_id: *topic_id,
                    log: Arc::new(Mutex::new(Vec::new())),
                    count: Arc::new(count),
                    collector: None,
                }
            }
        };

        let entries = generation.log.clone();
        let count = generation.count.clone();
        let collector = tokio::spawn(async move {
            while let Some(message) = subscription.next().await {
                let mut entries = entries.lock();
                if entries
                    .iter()
                    .any(|seen| seen.sequence_number == message.sequence_number)
                {
                    continue;
                }
                log::info!(
                    "Received message #{} on topic {}: {}",
                    message.sequence_number,
                    message.topic_id,
                    message.text()
                );
                entries.push(message);
                count.send_replace(entries.len());
            }
        });

        self.current = Some(Generation {
            collector: Some(collector),
            ..generation
        });
        Ok(())
    }

    /// Snapshot of the log so far
    pub fn messages(&self) -> Vec<TopicMessage> {
        self.current
            .as_ref()
            .map(|generation| generation.log.lock().clone())
            .unwrap_or_default()
    }

    /// Wait until at least `min_count` messages arrived or `timeout` elapsed
    ///
    /// A short observation is not an error here; the caller decides through
    /// [`Observation::into_result`] or by inspecting `timed_out`.
    pub async fn await_messages(
        &self,
        min_count: usize,
        timeout: Duration,
    ) -> Result<Observation, LedgerError> {
        let generation = self
            .current
            .as_ref()
            .ok_or_else(|| LedgerError::invalid_state("observer is not subscribed to a topic"))?;

        let started = self.clock.now();
        let mut count = generation.count.subscribe();
        let timed_out = tokio::select! {
            reached = count.wait_for(|n| *n >= min_count) => reached.is_err(),
            _ = self.clock.sleep(timeout) => true,
        };

        let messages = generation.log.lock().clone();
        let timed_out = timed_out && messages.len() < min_count;
        Ok(Observation {
            messages,
            expected: min_count,
            waited: self.clock.elapsed(started),
            timed_out,
        })
    }
}

impl Drop for MessageObserver {
    fn drop(&mut self) {
        if let Some(collector) = self.current.as_mut().and_then(|g| g.collector.take()) {
            collector.abort();
        }
    }
}
