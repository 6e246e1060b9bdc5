//! Cancellable delayed eviction timers.
//!
//! Each armed timer is a spawned sleep that posts `EvictionDue` back to the
//! actor. Cancelling aborts the task, but a timer may already have posted its
//! notification; the generation number lets the actor discard such stale
//! notifications.

use std::collections::HashMap;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Instant;

use super::commands::ContentEngineCommand;
use crate::content::InfoHash;

struct EvictionTimer {
    generation: u64,
    deadline: Instant,
    task: JoinHandle<()>,
}

pub(crate) struct EvictionScheduler {
    timers: HashMap<InfoHash, EvictionTimer>,
    next_generation: u64,
    notifier: mpsc::UnboundedSender<ContentEngineCommand>,
}

impl EvictionScheduler {
    pub fn new(notifier: mpsc::UnboundedSender<ContentEngineCommand>) -> Self {
        Self {
            timers: HashMap::new(),
            next_generation: 0,
            notifier,
        }
    }

    /// Arms a timer for `info_hash`, replacing any timer already armed.
    pub fn schedule(&mut self, info_hash: InfoHash, delay: Duration) -> Instant {
        self.cancel(&info_hash);

        self.next_generation += 1;
        let generation = self.next_generation;
        let deadline = Instant::now() + delay;
        let notifier = self.notifier.clone();

        let task = tokio::spawn(async move {
            tokio::time::sleep_until(deadline).await;
            let _ = notifier.send(ContentEngineCommand::EvictionDue {
                info_hash,
                generation,
            });
        });

        self.timers.insert(
            info_hash,
            EvictionTimer {
                generation,
                deadline,
                task,
            },
        );
        deadline
    }

    /// Disarms the timer for `info_hash`. Returns whether one was armed.
    pub fn cancel(&mut self, info_hash: &InfoHash) -> bool {
        match self.timers.remove(info_hash) {
            Some(timer) => {
                timer.task.abort();
                true
            }
            None => false,
        }
    }

    /// Consumes the timer if `generation` is the one currently armed.
    pub fn take_due(&mut self, info_hash: &InfoHash, generation: u64) -> bool {
        match self.timers.get(info_hash) {
            Some(timer) if timer.generation == generation => {
                self.timers.remove(info_hash);
                true
            }
            _ => false,
        }
    }

    /// When the armed timer for `info_hash` fires, if one is armed.
    pub fn deadline(&self, info_hash: &InfoHash) -> Option<Instant> {
        self.timers.get(info_hash).map(|timer| timer.deadline)
    }

    pub fn cancel_all(&mut self) {
        for (_, timer) in self.timers.drain() {
            timer.task.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn due(command: ContentEngineCommand) -> (InfoHash, u64) {
        match command {
            ContentEngineCommand::EvictionDue {
                info_hash,
                generation,
            } => (info_hash, generation),
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_timer_fires_after_delay() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut scheduler = EvictionScheduler::new(tx);
        let hash = InfoHash::new([1u8; 20]);

        let deadline = scheduler.schedule(hash, Duration::from_secs(30));
        assert_eq!(scheduler.deadline(&hash), Some(deadline));

        let (fired, generation) = due(rx.recv().await.unwrap());
        assert_eq!(fired, hash);
        assert!(Instant::now() >= deadline);
        assert!(scheduler.take_due(&hash, generation));
        assert_eq!(scheduler.deadline(&hash), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_rescheduling_replaces_timer() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut scheduler = EvictionScheduler::new(tx);
        let hash = InfoHash::new([1u8; 20]);

        scheduler.schedule(hash, Duration::from_secs(5));
        scheduler.schedule(hash, Duration::from_secs(10));

        let (_, generation) = due(rx.recv().await.unwrap());
        assert_eq!(generation, 2);
        assert!(scheduler.take_due(&hash, generation));

        tokio::time::sleep(Duration::from_secs(60)).await;
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_stale_notification_is_ignored() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let mut scheduler = EvictionScheduler::new(tx);
        let hash = InfoHash::new([1u8; 20]);

        scheduler.schedule(hash, Duration::ZERO);
        assert!(scheduler.cancel(&hash));
        assert!(!scheduler.cancel(&hash));
        scheduler.schedule(hash, Duration::from_secs(1));

        assert!(!scheduler.take_due(&hash, 1));
        assert!(scheduler.deadline(&hash).is_some());
    }
}
