//! [`InvalidationSignal`]: one-shot "the key set changed" flag.

use tokio_util::sync::CancellationToken;

/// A one-shot flag a key store fires when its key set changes.
///
/// Once fired it never resets; a store hands out a fresh signal for every
/// subsequent change. Clones observe the same underlying flag.
#[derive(Debug, Clone, Default)]
pub struct InvalidationSignal {
    token: CancellationToken,
}

impl InvalidationSignal {
    /// Create an unfired signal.
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark the signal as fired. Idempotent.
    pub fn fire(&self) {
        self.token.cancel();
    }

    pub fn is_fired(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Resolve once the signal fires.
    pub async fn fired(&self) {
        self.token.cancelled().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_unfired() {
        assert!(!InvalidationSignal::new().is_fired());
    }

    #[test]
    fn clones_share_state() {
        let signal = InvalidationSignal::new();
        let observer = signal.clone();
        signal.fire();
        assert!(observer.is_fired());
        // firing twice is harmless
        observer.fire();
        assert!(signal.is_fired());
    }

    #[tokio::test]
    async fn fired_resolves_after_fire() {
        let signal = InvalidationSignal::new();
        let waiter = signal.clone();
        let handle = tokio::spawn(async move { waiter.fired().await });
        signal.fire();
        handle.await.unwrap();
    }
}
