//! Watermark accounting for in-flight work

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::Mutex;

use tokio::sync::watch;

use crate::model::lock;

/// Sequence number handed out for every accepted trigger.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Watermark(pub u64);

impl fmt::Display for Watermark {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Watermarks a unit of work (a pass or a build) is attributed to.
pub(crate) type Marks = BTreeSet<Watermark>;

#[derive(Debug, Default)]
struct Ledger {
    last: u64,
    /// watermark -> units of work still attributed to it
    outstanding: BTreeMap<u64, usize>,
}

/// Tracks which watermarks still have work in flight.
///
/// Every pass and build holds one count on each watermark it is attributed
/// to. Work it spawns takes its counts before releasing its own, so a
/// watermark only settles after everything it caused has finished.
#[derive(Debug)]
pub(crate) struct ActivityTracker {
    ledger: Mutex<Ledger>,
    generation: watch::Sender<u64>,
}

impl ActivityTracker {
    pub(crate) fn new() -> Self {
        let (generation, _) = watch::channel(0);
        Self {
            ledger: Mutex::new(Ledger::default()),
            generation,
        }
    }

    /// Issue the next watermark, holding one count for the caller while it
    /// dispatches the trigger's work.
    pub(crate) fn accept(&self) -> Watermark {
        let mut ledger = lock(&self.ledger);
        ledger.last += 1;
        let mark = ledger.last;
        ledger.outstanding.insert(mark, 1);
        Watermark(mark)
    }

    /// Last issued watermark.
    pub(crate) fn current(&self) -> Watermark {
        Watermark(lock(&self.ledger).last)
    }

    pub(crate) fn begin(&self, marks: &Marks) {
        let mut ledger = lock(&self.ledger);
        for mark in marks {
            *ledger.outstanding.entry(mark.0).or_insert(0) += 1;
        }
    }

    pub(crate) fn finish(&self, marks: &Marks) {
        {
            let mut ledger = lock(&self.ledger);
            for mark in marks {
                if let Some(count) = ledger.outstanding.get_mut(&mark.0) {
                    *count -= 1;
                    if *count == 0 {
                        ledger.outstanding.remove(&mark.0);
                    }
                }
            }
        }
        self.generation.send_modify(|generation| *generation += 1);
    }

    /// Whether all work attributed to watermarks up to `mark` has finished.
    pub(crate) fn settled(&self, mark: Watermark) -> bool {
        lock(&self.ledger)
            .outstanding
            .range(..=mark.0)
            .next()
            .is_none()
    }

    pub(crate) async fn wait(&self, mark: Watermark) {
        let mut changes = self.generation.subscribe();
        loop {
            if self.settled(mark) {
                return;
            }
            if changes.changed().await.is_err() {
                return;
            }
        }
    }
}
