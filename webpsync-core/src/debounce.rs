use crate::file_op::FsEvent;
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{sleep_until, Instant};

/// Collapses bursts of notifications into one settled path per burst.
///
/// Each notification (re)starts a quiet window for its path; once a path has
/// been quiet for the whole window it is sent downstream. Paths are
/// independent of each other.
#[derive(Debug)]
pub struct EventDebouncer {
    window: Duration,
    pending: HashMap<PathBuf, Instant>,
}

impl EventDebouncer {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            pending: HashMap::new(),
        }
    }

    pub fn push(&mut self, event: FsEvent, now: Instant) {
        self.pending.insert(event.into_path(), now + self.window);
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        self.pending.values().min().copied()
    }

    /// Remove and return every path whose window has elapsed, oldest first.
    pub fn take_settled(&mut self, now: Instant) -> Vec<PathBuf> {
        let mut ready: Vec<(Instant, PathBuf)> = self
            .pending
            .iter()
            .filter(|(_, deadline)| **deadline <= now)
            .map(|(path, deadline)| (*deadline, path.clone()))
            .collect();
        ready.sort();
        for (_, path) in &ready {
            self.pending.remove(path);
        }
        ready.into_iter().map(|(_, path)| path).collect()
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Drive the debouncer on its own task until either channel closes.
    ///
    /// Whatever is still pending when the input closes is dropped.
    pub fn spawn(
        mut self,
        mut events: mpsc::Receiver<FsEvent>,
        settled: mpsc::Sender<PathBuf>,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            loop {
                let deadline = self.next_deadline();
                tokio::select! {
                    ev = events.recv() => match ev {
                        Some(ev) => self.push(ev, Instant::now()),
                        None => break,
                    },
                    _ = async { if let Some(d) = deadline { sleep_until(d).await } }, if deadline.is_some() => {
                        for path in self.take_settled(Instant::now()) {
                            if settled.send(path).await.is_err() {
                                return;
                            }
                        }
                    }
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn later_events_push_the_deadline_back() {
        let window = Duration::from_millis(100);
        let mut deb = EventDebouncer::new(window);
        let t0 = Instant::now();
        deb.push(FsEvent::Created("/in/a.jpg".into()), t0);
        deb.push(FsEvent::Modified("/in/a.jpg".into()), t0 + Duration::from_millis(60));
        assert_eq!(deb.len(), 1);

        assert!(deb.take_settled(t0 + Duration::from_millis(120)).is_empty());
        assert_eq!(
            deb.take_settled(t0 + Duration::from_millis(160)),
            vec![PathBuf::from("/in/a.jpg")]
        );
        assert!(deb.is_empty());
    }

    #[test]
    fn paths_settle_independently_in_deadline_order() {
        let window = Duration::from_millis(50);
        let mut deb = EventDebouncer::new(window);
        let t0 = Instant::now();
        deb.push(FsEvent::Modified("/in/b.jpg".into()), t0 + Duration::from_millis(10));
        deb.push(FsEvent::Modified("/in/a.jpg".into()), t0);
        assert_eq!(deb.next_deadline(), Some(t0 + window));

        let settled = deb.take_settled(t0 + Duration::from_millis(100));
        assert_eq!(
            settled,
            vec![PathBuf::from("/in/a.jpg"), PathBuf::from("/in/b.jpg")]
        );
    }

    #[tokio::test]
    async fn burst_yields_a_single_settled_path() {
        let (ev_tx, ev_rx) = mpsc::channel(16);
        let (out_tx, mut out_rx) = mpsc::channel(16);
        let handle = EventDebouncer::new(Duration::from_millis(100)).spawn(ev_rx, out_tx);

        ev_tx.send(FsEvent::Created("/in/a.jpg".into())).await.unwrap();
        for _ in 0..4 {
            ev_tx.send(FsEvent::Modified("/in/a.jpg".into())).await.unwrap();
        }
        ev_tx.send(FsEvent::Created("/in/b.jpg".into())).await.unwrap();

        let first = tokio::time::timeout(Duration::from_secs(2), out_rx.recv())
            .await
            .unwrap();
        let second = tokio::time::timeout(Duration::from_secs(2), out_rx.recv())
            .await
            .unwrap();
        assert_eq!(first, Some(PathBuf::from("/in/a.jpg")));
        assert_eq!(second, Some(PathBuf::from("/in/b.jpg")));

        // nothing else was queued for the burst
        assert!(
            tokio::time::timeout(Duration::from_millis(300), out_rx.recv())
                .await
                .is_err()
        );

        drop(ev_tx);
        handle.await.unwrap();
    }
}
