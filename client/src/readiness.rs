//! One-shot "identification complete" signal, renewed for every connection epoch.

use tokio::sync::watch;

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Readiness {
    Pending,
    Identified,
    /// A newer epoch replaced this signal; waiters move on to it.
    Superseded,
    Failed(String),
    Closed,
}

pub(crate) struct ReadinessSignal {
    tx: watch::Sender<Readiness>,
}

impl ReadinessSignal {
    pub(crate) fn new() -> Self {
        let (tx, _) = watch::channel(Readiness::Pending);
        Self { tx }
    }

    pub(crate) fn subscribe(&self) -> ReadinessWaiter {
        ReadinessWaiter {
            rx: self.tx.subscribe(),
        }
    }

    pub(crate) fn resolve(&self) -> bool {
        self.settle(Readiness::Identified)
    }

    /// Moves a pending signal to `outcome`. Settled signals never change again.
    pub(crate) fn settle(&self, outcome: Readiness) -> bool {
        self.tx.send_if_modified(|current| {
            if *current == Readiness::Pending {
                *current = outcome;
                true
            } else {
                false
            }
        })
    }

    #[cfg(test)]
    pub(crate) fn current(&self) -> Readiness {
        self.tx.borrow().clone()
    }
}

pub(crate) struct ReadinessWaiter {
    rx: watch::Receiver<Readiness>,
}

impl ReadinessWaiter {
    pub(crate) async fn wait(mut self) -> Readiness {
        match self
            .rx
            .wait_for(|state| *state != Readiness::Pending)
            .await
        {
            Ok(state) => state.clone(),
            // Dropped without settling: replaced by a newer epoch.
            Err(_) => Readiness::Superseded,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use tokio::time::timeout;

    use super::{Readiness, ReadinessSignal};

    #[tokio::test]
    async fn resolves_exactly_once() {
        let signal = ReadinessSignal::new();
        let waiter = signal.subscribe();
        assert!(signal.resolve());
        assert!(!signal.resolve());
        assert!(!signal.settle(Readiness::Closed));
        assert_eq!(waiter.wait().await, Readiness::Identified);
        assert_eq!(signal.current(), Readiness::Identified);
    }

    #[tokio::test]
    async fn late_subscriber_sees_settled_state() {
        let signal = ReadinessSignal::new();
        signal.settle(Readiness::Failed("refused".into()));
        assert_eq!(
            signal.subscribe().wait().await,
            Readiness::Failed("refused".into())
        );
    }

    #[tokio::test]
    async fn dropping_signal_supersedes_waiters() {
        let signal = ReadinessSignal::new();
        let waiter = signal.subscribe();
        drop(signal);
        assert_eq!(waiter.wait().await, Readiness::Superseded);
    }

    #[tokio::test]
    async fn pending_signal_keeps_waiter_suspended() {
        let signal = ReadinessSignal::new();
        let waiter = signal.subscribe();
        assert!(
            timeout(Duration::from_millis(20), waiter.wait())
                .await
                .is_err()
        );
        assert_eq!(signal.current(), Readiness::Pending);
    }
}
