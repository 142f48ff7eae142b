//! Authentication capability consumed by the transport.
//!
//! Token acquisition is the embedding application's concern; the client
//! only needs to know whether the current token is usable and how to ask
//! for a fresh one.

use crate::error::{GraphError, GraphResult};
use async_trait::async_trait;
use std::time::{Duration, SystemTime};
use tokio::sync::RwLock;
use tracing::debug;

/// A bearer token that can be checked and refreshed in place.
///
/// Implementations are shared across every object and pager created from a
/// client, so refresh must be safe to call concurrently.
#[async_trait]
pub trait TokenSource: Send + Sync {
    /// Returns whether the current token can still be used.
    async fn is_valid(&self) -> bool;

    /// Obtains a new token, replacing the current one.
    async fn refresh(&self) -> GraphResult<()>;

    /// The current access token.
    async fn access_token(&self) -> GraphResult<String>;

    /// Refreshes the token if it is no longer valid.
    async fn ensure_valid(&self) -> GraphResult<()> {
        if !self.is_valid().await {
            debug!("Access token expired, refreshing");
            self.refresh().await?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
struct CachedToken {
    access_token: String,
    expires_at: Option<SystemTime>,
}

/// A fixed bearer token with an optional expiry.
///
/// It has no credentials to refresh with; once expired, requests fail with
/// [`GraphError::Auth`] until [`StaticToken::replace`] supplies a new one.
#[derive(Debug)]
pub struct StaticToken {
    token: RwLock<CachedToken>,
}

impl StaticToken {
    /// A token that never expires.
    pub fn new(access_token: impl Into<String>) -> Self {
        Self {
            token: RwLock::new(CachedToken {
                access_token: access_token.into(),
                expires_at: None,
            }),
        }
    }

    /// A token that expires `lifetime` from now.
    pub fn expiring_in(access_token: impl Into<String>, lifetime: Duration) -> Self {
        Self {
            token: RwLock::new(CachedToken {
                access_token: access_token.into(),
                expires_at: Some(SystemTime::now() + lifetime),
            }),
        }
    }

    /// Swaps in a new token (e.g., one obtained out of band).
    pub async fn replace(&self, access_token: impl Into<String>, expires_at: Option<SystemTime>) {
        *self.token.write().await = CachedToken {
            access_token: access_token.into(),
            expires_at,
        };
    }
}

#[async_trait]
impl TokenSource for StaticToken {
    async fn is_valid(&self) -> bool {
        let token = self.token.read().await;
        token
            .expires_at
            .map_or(true, |exp| SystemTime::now() < exp)
    }

    async fn refresh(&self) -> GraphResult<()> {
        Err(GraphError::Auth(
            "token expired and no refresh capability is available".to_string(),
        ))
    }

    async fn access_token(&self) -> GraphResult<String> {
        Ok(self.token.read().await.access_token.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn non_expiring_token_is_valid() {
        let token = StaticToken::new("abc");
        assert!(token.is_valid().await);
        token.ensure_valid().await.unwrap();
        assert_eq!(token.access_token().await.unwrap(), "abc");
    }

    #[tokio::test]
    async fn expired_token_cannot_refresh() {
        let token = StaticToken::expiring_in("abc", Duration::ZERO);
        assert!(!token.is_valid().await);
        assert!(matches!(token.ensure_valid().await, Err(GraphError::Auth(_))));
    }

    #[tokio::test]
    async fn replace_restores_validity() {
        let token = StaticToken::expiring_in("old", Duration::ZERO);
        token
            .replace("new", Some(SystemTime::now() + Duration::from_secs(3600)))
            .await;
        assert!(token.is_valid().await);
        assert_eq!(token.access_token().await.unwrap(), "new");
    }
}
