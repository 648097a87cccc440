//! Token expiry reconciler: purges one-time auth tokens past their expiry.

use std::sync::Arc;

use async_trait::async_trait;

use crate::domain::foundation::DomainError;
use crate::ports::{AuthTokenStore, Clock};

use super::reconciler::{Reconciler, SweepReport};

pub struct TokenExpiryReconciler {
    tokens: Arc<dyn AuthTokenStore>,
    clock: Arc<dyn Clock>,
}

impl TokenExpiryReconciler {
    pub fn new(tokens: Arc<dyn AuthTokenStore>, clock: Arc<dyn Clock>) -> Self {
        Self { tokens, clock }
    }
}

#[async_trait]
impl Reconciler for TokenExpiryReconciler {
    fn name(&self) -> &'static str {
        "token_expiry"
    }

    async fn sweep(&self) -> Result<SweepReport, DomainError> {
        let deleted = self.tokens.delete_expired(self.clock.now()).await?;
        Ok(SweepReport {
            processed: deleted as usize,
            failed: 0,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::{InMemoryStore, ManualClock};
    use crate::domain::foundation::Timestamp;

    #[tokio::test]
    async fn deletes_only_expired_tokens() {
        let now = Timestamp::now();
        let store = Arc::new(InMemoryStore::new());
        store.add_auth_token(now.plus_secs(-10));
        store.add_auth_token(now.plus_secs(-1));
        store.add_auth_token(now.plus_secs(3600));

        let reconciler = TokenExpiryReconciler::new(store.clone(), Arc::new(ManualClock::new(now)));

        assert_eq!(reconciler.sweep().await.unwrap().processed, 2);
        assert_eq!(store.auth_token_count(), 1);
        assert!(reconciler.sweep().await.unwrap().is_idle());
    }
}
