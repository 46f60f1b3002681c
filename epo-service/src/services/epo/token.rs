//! In-memory holder for the OPS OAuth access token.

use super::UpstreamError;
use secrecy::{ExposeSecret, Secret};
use std::future::Future;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

/// Tokens closer than this to expiry are replaced before use.
pub const DEFAULT_REFRESH_MARGIN: Duration = Duration::from_secs(60);

/// Upper bound on the lifetime taken from a token response.
pub const MAX_TOKEN_LIFETIME: Duration = Duration::from_secs(24 * 60 * 60);

#[derive(Debug, Clone)]
pub struct AccessToken {
    value: Secret<String>,
    expires_at: Instant,
}

impl AccessToken {
    /// Lifetimes above [`MAX_TOKEN_LIFETIME`] are clamped to it.
    pub fn new(value: impl Into<String>, expires_in: Duration) -> Self {
        Self {
            value: Secret::new(value.into()),
            expires_at: Instant::now() + expires_in.min(MAX_TOKEN_LIFETIME),
        }
    }

    pub fn value(&self) -> &str {
        self.value.expose_secret()
    }

    fn is_fresh(&self, margin: Duration) -> bool {
        self.expires_at
            .checked_duration_since(Instant::now())
            .is_some_and(|left| left > margin)
    }
}

/// Single-slot token cache shared by all requests.
pub struct TokenCache {
    slot: RwLock<Option<AccessToken>>,
    refresh_margin: Duration,
}

impl Default for TokenCache {
    fn default() -> Self {
        Self::new(DEFAULT_REFRESH_MARGIN)
    }
}

impl TokenCache {
    pub fn new(refresh_margin: Duration) -> Self {
        Self {
            slot: RwLock::new(None),
            refresh_margin,
        }
    }

    /// Return a fresh token, calling `fetch` only when the slot is empty or
    /// stale. Concurrent callers wait on the write lock, so one exchange
    /// serves all of them.
    pub async fn get_or_refresh<F, Fut>(&self, fetch: F) -> Result<AccessToken, UpstreamError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<AccessToken, UpstreamError>>,
    {
        {
            let slot = self.slot.read().await;
            if let Some(token) = slot.as_ref().filter(|t| t.is_fresh(self.refresh_margin)) {
                return Ok(token.clone());
            }
        }

        let mut slot = self.slot.write().await;
        // Another request may have refreshed while we waited for the lock.
        if let Some(token) = slot.as_ref().filter(|t| t.is_fresh(self.refresh_margin)) {
            return Ok(token.clone());
        }

        let token = fetch().await?;
        tracing::debug!("Obtained new EPO access token");
        *slot = Some(token.clone());
        Ok(token)
    }

    /// Drop the cached token so the next call exchanges credentials again.
    pub async fn invalidate(&self) {
        *self.slot.write().await = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    async fn fetch_counted(
        cache: &TokenCache,
        calls: &AtomicUsize,
        expires_in: Duration,
    ) -> Result<AccessToken, UpstreamError> {
        cache
            .get_or_refresh(|| async {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                Ok(AccessToken::new(format!("token-{}", n), expires_in))
            })
            .await
    }

    #[tokio::test]
    async fn reuses_token_until_near_expiry() {
        let cache = TokenCache::default();
        let calls = AtomicUsize::new(0);

        let first = fetch_counted(&cache, &calls, Duration::from_secs(1200))
            .await
            .unwrap();
        let second = fetch_counted(&cache, &calls, Duration::from_secs(1200))
            .await
            .unwrap();

        assert_eq!(first.value(), "token-0");
        assert_eq!(second.value(), "token-0");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn refreshes_tokens_inside_the_margin() {
        let cache = TokenCache::default();
        let calls = AtomicUsize::new(0);

        fetch_counted(&cache, &calls, Duration::from_secs(30))
            .await
            .unwrap();
        let second = fetch_counted(&cache, &calls, Duration::from_secs(30))
            .await
            .unwrap();

        assert_eq!(second.value(), "token-1");
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn huge_lifetimes_are_clamped() {
        let token = AccessToken::new("abc", Duration::from_secs(u64::MAX));
        assert!(token.is_fresh(DEFAULT_REFRESH_MARGIN));
        assert!(token.expires_at <= Instant::now() + MAX_TOKEN_LIFETIME);
    }

    #[tokio::test]
    async fn invalidate_forces_a_new_exchange() {
        let cache = TokenCache::default();
        let calls = AtomicUsize::new(0);

        fetch_counted(&cache, &calls, Duration::from_secs(1200))
            .await
            .unwrap();
        cache.invalidate().await;
        fetch_counted(&cache, &calls, Duration::from_secs(1200))
            .await
            .unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn failed_exchange_leaves_slot_empty() {
        let cache = TokenCache::default();

        let err = cache
            .get_or_refresh(|| async {
                Err(UpstreamError::Authentication("invalid_client".to_string()))
            })
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "auth");

        let calls = AtomicUsize::new(0);
        fetch_counted(&cache, &calls, Duration::from_secs(1200))
            .await
            .unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn concurrent_callers_share_one_exchange() {
        let cache = Arc::new(TokenCache::default());
        let calls = Arc::new(AtomicUsize::new(0));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let cache = cache.clone();
                let calls = calls.clone();
                tokio::spawn(async move {
                    fetch_counted(&cache, &calls, Duration::from_secs(1200))
                        .await
                        .map(|t| t.value().to_string())
                })
            })
            .collect();

        for handle in handles {
            assert_eq!(handle.await.unwrap().unwrap(), "token-0");
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
