use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::PolicyDocument;

/// Keyed storage for policy documents.
#[async_trait]
pub trait PolicyStore: Send + Sync {
    /// Inserts or replaces a document.
    async fn save(&self, document: PolicyDocument);

    async fn find(&self, id: &str) -> Option<PolicyDocument>;
}

/// In-memory policy store.
#[derive(Clone, Default)]
pub struct InMemoryPolicyStore {
    documents: Arc<RwLock<HashMap<String, PolicyDocument>>>,
}

impl InMemoryPolicyStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.documents.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.documents.read().await.is_empty()
    }
}

#[async_trait]
impl PolicyStore for InMemoryPolicyStore {
    async fn save(&self, document: PolicyDocument) {
        self.documents
            .write()
            .await
            .insert(document.id.clone(), document);
    }

    async fn find(&self, id: &str) -> Option<PolicyDocument> {
        self.documents.read().await.get(id).cloned()
    }
}
