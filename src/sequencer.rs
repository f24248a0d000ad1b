//! Per-user FIFO sequencing. Every user owns an unbounded queue; one drain
//! task at a time works it head-first, so a user's messages reach the
//! backend strictly in arrival order while different users proceed in
//! parallel.

use async_trait::async_trait;
use dashmap::DashMap;
use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::time::sleep;
use tracing::{error, trace};

/// What the sequencer hands each message to once its turn comes.
#[async_trait]
pub trait ProcessMessage: Send + Sync {
    /// Processing failures are the implementor's to surface to the user;
    /// the sequencer only logs them and moves on to the next message.
    async fn process(&self, user_id: &str, text: &str) -> anyhow::Result<()>;
}

struct UserQueue {
    pending: Mutex<VecDeque<String>>,
    draining: AtomicBool,
}

impl UserQueue {
    fn new() -> Self {
        Self {
            pending: Mutex::new(VecDeque::new()),
            draining: AtomicBool::new(false),
        }
    }
}

pub struct UserSequencer {
    queues: DashMap<String, Arc<UserQueue>>,
    processor: Arc<dyn ProcessMessage>,
    /// Delay after each message before the next one is picked up.
    pacing: Duration,
}

impl UserSequencer {
    pub fn new(processor: Arc<dyn ProcessMessage>, pacing: Duration) -> Arc<Self> {
        Arc::new(Self {
            queues: DashMap::new(),
            processor,
            pacing,
        })
    }

    /// Enqueues a message and ensures a drain task is running for the user.
    /// Never blocks: queue depth is unbounded.
    pub fn submit(self: &Arc<Self>, user_id: &str, text: impl Into<String>) {
        let queue = self
            .queues
            .entry(user_id.to_string())
            .or_insert_with(|| Arc::new(UserQueue::new()))
            .clone();
        queue.pending.lock().unwrap().push_back(text.into());

        if !queue.draining.swap(true, Ordering::AcqRel) {
            let seq = self.clone();
            let user = user_id.to_string();
            tokio::spawn(async move {
                seq.drain(&user, queue).await;
            });
        }
    }

    /// Messages waiting for the user, including the one being processed.
    pub fn depth(&self, user_id: &str) -> usize {
        self.queues
            .get(user_id)
            .map(|q| q.pending.lock().unwrap().len())
            .unwrap_or(0)
    }

    async fn drain(self: Arc<Self>, user_id: &str, queue: Arc<UserQueue>) {
        loop {
            // Peek rather than pop: the head stays visible in the queue
            // until it has been fully processed.
            let head = queue.pending.lock().unwrap().front().cloned();
            let Some(text) = head else {
                queue.draining.store(false, Ordering::Release);
                // A submit may have slipped in between the empty peek and
                // the flag clear; reclaim the drain if so.
                if queue.pending.lock().unwrap().is_empty()
                    || queue.draining.swap(true, Ordering::AcqRel)
                {
                    return;
                }
                continue;
            };

            trace!(user_id, "processing queued message");
            if let Err(err) = self.processor.process(user_id, &text).await {
                error!(user_id, %err, "message processing failed");
            }
            queue.pending.lock().unwrap().pop_front();

            sleep(self.pacing).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    /// Records processed messages, fails on "boom" input, and tracks how
    /// many calls overlap.
    struct Recorder {
        seen: Mutex<Vec<(String, String)>>,
        in_flight: AtomicUsize,
        max_in_flight: AtomicUsize,
    }

    impl Recorder {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                seen: Mutex::new(Vec::new()),
                in_flight: AtomicUsize::new(0),
                max_in_flight: AtomicUsize::new(0),
            })
        }

        fn seen(&self) -> Vec<(String, String)> {
            self.seen.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl ProcessMessage for Recorder {
        async fn process(&self, user_id: &str, text: &str) -> anyhow::Result<()> {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(now, Ordering::SeqCst);
            sleep(Duration::from_millis(5)).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);

            self.seen
                .lock()
                .unwrap()
                .push((user_id.to_string(), text.to_string()));
            if text.starts_with("boom") {
                anyhow::bail!("synthetic failure");
            }
            Ok(())
        }
    }

    async fn wait_for<F: Fn() -> bool>(cond: F) {
        for _ in 0..500 {
            if cond() {
                return;
            }
            sleep(Duration::from_millis(2)).await;
        }
        panic!("condition not reached in time");
    }

    fn sequencer(recorder: &Arc<Recorder>) -> Arc<UserSequencer> {
        UserSequencer::new(recorder.clone(), Duration::from_millis(1))
    }

    #[tokio::test]
    async fn preserves_arrival_order_per_user() {
        let rec = Recorder::new();
        let seq = sequencer(&rec);

        for i in 0..5 {
            seq.submit("alice", format!("m{i}"));
        }
        wait_for(|| rec.seen().len() == 5).await;

        let texts: Vec<String> = rec.seen().into_iter().map(|(_, t)| t).collect();
        assert_eq!(texts, vec!["m0", "m1", "m2", "m3", "m4"]);
    }

    #[tokio::test]
    async fn one_message_in_flight_per_user() {
        let rec = Recorder::new();
        let seq = sequencer(&rec);

        for i in 0..4 {
            seq.submit("alice", format!("m{i}"));
        }
        wait_for(|| rec.seen().len() == 4).await;

        assert_eq!(rec.max_in_flight.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn users_proceed_independently() {
        let rec = Recorder::new();
        let seq = sequencer(&rec);

        seq.submit("alice", "a1");
        seq.submit("bob", "b1");
        seq.submit("alice", "a2");
        seq.submit("bob", "b2");
        wait_for(|| rec.seen().len() == 4).await;

        let alice: Vec<String> = rec
            .seen()
            .into_iter()
            .filter(|(u, _)| u == "alice")
            .map(|(_, t)| t)
            .collect();
        assert_eq!(alice, vec!["a1", "a2"]);
    }

    #[tokio::test]
    async fn failure_does_not_stall_the_queue() {
        let rec = Recorder::new();
        let seq = sequencer(&rec);

        seq.submit("alice", "boom");
        seq.submit("alice", "after");
        wait_for(|| rec.seen().len() == 2).await;

        assert_eq!(rec.seen()[1].1, "after");
        assert_eq!(seq.depth("alice"), 0);
    }

    #[tokio::test]
    async fn late_submit_restarts_the_drain() {
        let rec = Recorder::new();
        let seq = sequencer(&rec);

        seq.submit("alice", "first");
        wait_for(|| rec.seen().len() == 1).await;
        // Give the drain task time to park before the next submit.
        sleep(Duration::from_millis(20)).await;

        seq.submit("alice", "second");
        wait_for(|| rec.seen().len() == 2).await;
        assert_eq!(rec.seen()[1].1, "second");
    }
}
