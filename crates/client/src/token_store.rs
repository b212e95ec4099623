//! In-memory holder for the access credential

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Short-lived bearer credential
///
/// Immutable once created; replacing the session's credential means swapping
/// the whole value in the [`TokenStore`].
#[derive(Clone, PartialEq, Eq)]
pub struct AccessCredential(Arc<str>);

impl AccessCredential {
    /// Wrap a raw bearer token
    pub fn new(token: impl Into<String>) -> Self {
        Self(Arc::from(token.into()))
    }

    /// The raw token, for the `Authorization` header
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for AccessCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("AccessCredential(<redacted>)")
    }
}

/// Monotonic write counter, used for compare-and-swap updates
pub type Generation = u64;

#[derive(Debug, Default)]
struct Slot {
    value: Option<AccessCredential>,
    generation: Generation,
}

/// Process-memory credential store
///
/// Never persisted. Every write bumps the generation so a writer that read the
/// store earlier can detect that the session changed underneath it.
#[derive(Debug, Default)]
pub struct TokenStore {
    slot: Mutex<Slot>,
}

impl TokenStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Slot> {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Current credential, if any
    pub fn get(&self) -> Option<AccessCredential> {
        self.lock().value.clone()
    }

    /// Replace the credential
    pub fn set(&self, credential: Option<AccessCredential>) {
        let mut slot = self.lock();
        slot.value = credential;
        slot.generation += 1;
    }

    /// Drop the credential
    pub fn clear(&self) {
        self.set(None);
    }

    /// Whether a credential is held locally
    pub fn is_authenticated(&self) -> bool {
        self.lock().value.is_some()
    }

    /// Current generation and credential, read atomically
    pub fn snapshot(&self) -> (Generation, Option<AccessCredential>) {
        let slot = self.lock();
        (slot.generation, slot.value.clone())
    }

    /// Replace the credential only if nothing was written since `generation`
    ///
    /// Returns whether the write happened.
    pub fn replace_if(&self, generation: Generation, credential: Option<AccessCredential>) -> bool {
        let mut slot = self.lock();
        if slot.generation != generation {
            return false;
        }
        slot.value = credential;
        slot.generation += 1;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_get_clear() {
        let store = TokenStore::new();
        assert!(store.get().is_none());
        assert!(!store.is_authenticated());

        store.set(Some(AccessCredential::new("abc")));
        assert_eq!(store.get(), Some(AccessCredential::new("abc")));
        assert!(store.is_authenticated());

        store.clear();
        assert!(store.get().is_none());
    }

    #[test]
    fn test_every_write_bumps_generation() {
        let store = TokenStore::new();
        let (g0, _) = store.snapshot();
        store.set(Some(AccessCredential::new("a")));
        let (g1, _) = store.snapshot();
        store.clear();
        let (g2, _) = store.snapshot();
        assert!(g0 < g1 && g1 < g2);
    }

    #[test]
    fn test_replace_if_rejects_stale_generation() {
        let store = TokenStore::new();
        let (generation, _) = store.snapshot();

        store.set(Some(AccessCredential::new("from-login")));
        assert!(!store.replace_if(generation, Some(AccessCredential::new("stale"))));
        assert_eq!(store.get(), Some(AccessCredential::new("from-login")));

        let (generation, _) = store.snapshot();
        assert!(store.replace_if(generation, Some(AccessCredential::new("fresh"))));
        assert_eq!(store.get(), Some(AccessCredential::new("fresh")));
    }

    #[test]
    fn test_debug_redacts_token() {
        let credential = AccessCredential::new("super-secret");
        let rendered = format!("{credential:?}");
        assert!(!rendered.contains("super-secret"));
    }

    #[test]
    fn test_concurrent_writers_never_tear() {
        let store = Arc::new(TokenStore::new());
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let store = store.clone();
                std::thread::spawn(move || {
                    for _ in 0..100 {
                        store.set(Some(AccessCredential::new(format!("token-{i}"))));
                        let seen = store.get().unwrap();
                        assert!(seen.expose().starts_with("token-"));
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        let (generation, _) = store.snapshot();
        assert_eq!(generation, 800);
    }
}
