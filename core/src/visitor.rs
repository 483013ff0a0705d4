//! Visitor id providers.

use async_trait::async_trait;
use tokio::sync::OnceCell;
use uuid::Uuid;

/// Source of the per-session visitor identifier sent with analytics-enabled
/// requests.
#[async_trait]
pub trait VisitorIdProvider: Send + Sync {
    async fn visitor_id(&self) -> String;
}

/// Always returns the same, caller-supplied id.
#[derive(Debug, Clone)]
pub struct StaticVisitorId(pub String);

#[async_trait]
impl VisitorIdProvider for StaticVisitorId {
    async fn visitor_id(&self) -> String {
        self.0.clone()
    }
}

/// Generates a random id on first use and keeps it for the provider lifetime.
#[derive(Debug, Default)]
pub struct SessionVisitorId {
    id: OnceCell<String>,
}

impl SessionVisitorId {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl VisitorIdProvider for SessionVisitorId {
    async fn visitor_id(&self) -> String {
        self.id
            .get_or_init(|| async { Uuid::new_v4().to_string() })
            .await
            .clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn session_id_is_stable() {
        let provider = SessionVisitorId::new();
        let first = provider.visitor_id().await;
        let second = provider.visitor_id().await;
        assert_eq!(first, second);
        assert!(Uuid::parse_str(&first).is_ok());
    }

    #[tokio::test]
    async fn static_id_is_returned_as_is() {
        let provider = StaticVisitorId("visitor-1".to_string());
        assert_eq!(provider.visitor_id().await, "visitor-1");
    }
}
