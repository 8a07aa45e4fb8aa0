// ============================================================================
// Pending Confirms
// ============================================================================
//
// Table of publishes still waiting for a broker confirm, keyed by delivery
// tag. Each publish registers itself, gets the next tag and a waiter, and
// only ever observes the outcome for its own tag.
//
// The lock is never held across an await, so every operation is sync and
// can run from Drop.
//
// ============================================================================

use crawler_types::DeliveryTag;
use std::collections::BTreeMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::task::{Context, Poll};
use tokio::sync::oneshot;

/// How the broker settled one publish
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfirmOutcome {
    Ack,
    Nack,
    /// No confirm will arrive (channel closed, dispatcher stopped)
    Dropped,
}

/// Resolves to the confirm outcome of one registered publish
#[derive(Debug)]
pub struct ConfirmWaiter {
    tag: DeliveryTag,
    rx: oneshot::Receiver<ConfirmOutcome>,
}

impl ConfirmWaiter {
    pub fn tag(&self) -> DeliveryTag {
        self.tag
    }
}

impl Future for ConfirmWaiter {
    type Output = ConfirmOutcome;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.rx)
            .poll(cx)
            .map(|outcome| outcome.unwrap_or(ConfirmOutcome::Dropped))
    }
}

/// Removes its entry from the table when dropped.
///
/// Held by a publish for as long as it cares about the outcome, so a
/// cancelled or timed-out publish never leaves its tag behind.
#[must_use = "the entry is forgotten as soon as the guard is dropped"]
pub struct Registration<'a> {
    pending: &'a PendingConfirms,
    tag: DeliveryTag,
}

impl Registration<'_> {
    pub fn tag(&self) -> DeliveryTag {
        self.tag
    }
}

impl Drop for Registration<'_> {
    fn drop(&mut self) {
        self.pending.forget(self.tag);
    }
}

struct Table {
    next: DeliveryTag,
    waiting: BTreeMap<DeliveryTag, oneshot::Sender<ConfirmOutcome>>,
}

pub struct PendingConfirms {
    table: Mutex<Table>,
}

impl PendingConfirms {
    pub fn new() -> Self {
        Self {
            table: Mutex::new(Table {
                next: DeliveryTag::FIRST,
                waiting: BTreeMap::new(),
            }),
        }
    }

    /// Take the next tag in sequence and start waiting for its confirm
    pub fn register(&self) -> (DeliveryTag, ConfirmWaiter) {
        let mut table = self.lock();
        let tag = table.next;
        table.next = tag.next();

        let (tx, rx) = oneshot::channel();
        table.waiting.insert(tag, tx);
        (tag, ConfirmWaiter { tag, rx })
    }

    /// Like [`PendingConfirms::register`], with a guard that forgets the
    /// entry when dropped
    pub fn register_guarded(&self) -> (Registration<'_>, ConfirmWaiter) {
        let (tag, waiter) = self.register();
        (Registration { pending: self, tag }, waiter)
    }

    /// Settle `tag`, or every outstanding tag up to it when `multiple` is set.
    ///
    /// Returns how many entries were resolved; zero means the tag was
    /// unknown (already settled, timed out, or never issued).
    pub fn resolve(&self, tag: DeliveryTag, multiple: bool, outcome: ConfirmOutcome) -> usize {
        let mut table = self.lock();

        let covered: Vec<DeliveryTag> = if multiple {
            table.waiting.range(..=tag).map(|(pending, _)| *pending).collect()
        } else {
            table
                .waiting
                .keys()
                .filter(|pending| pending.is_covered_by(tag, false))
                .copied()
                .collect()
        };

        for pending in &covered {
            if let Some(tx) = table.waiting.remove(pending) {
                // The waiter may have given up already; nothing to deliver to
                let _ = tx.send(outcome);
            }
        }
        covered.len()
    }

    /// Drop the entry for `tag` without resolving it
    pub fn forget(&self, tag: DeliveryTag) -> bool {
        self.lock().waiting.remove(&tag).is_some()
    }

    /// Resolve every outstanding entry as [`ConfirmOutcome::Dropped`]
    pub fn fail_all(&self) -> usize {
        let waiting = std::mem::take(&mut self.lock().waiting);
        let count = waiting.len();
        for (_, tx) in waiting {
            let _ = tx.send(ConfirmOutcome::Dropped);
        }
        count
    }

    pub fn len(&self) -> usize {
        self.lock().waiting.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    // No code panics while holding the lock, so a poisoned table is still
    // consistent
    fn lock(&self) -> MutexGuard<'_, Table> {
        self.table.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for PendingConfirms {
    fn default() -> Self {
        Self::new()
    }
}
