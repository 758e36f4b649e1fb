use async_trait::async_trait;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use tokio::sync::RwLock;

use super::{DocumentError, DocumentPath, DocumentStore};

/// Document store held in process memory
#[derive(Default)]
pub struct MemoryDocumentStore {
    documents: RwLock<BTreeMap<String, Map<String, Value>>>,
}

impl MemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get(&self, path: &DocumentPath) -> Option<Map<String, Value>> {
        self.documents.read().await.get(&path.to_string()).cloned()
    }

    /// Paths of every stored document, sorted
    pub async fn paths(&self) -> Vec<String> {
        self.documents.read().await.keys().cloned().collect()
    }
}

#[async_trait]
impl DocumentStore for MemoryDocumentStore {
    async fn set(&self, path: &DocumentPath, fields: &Map<String, Value>) -> Result<(), DocumentError> {
        self.documents
            .write()
            .await
            .insert(path.to_string(), fields.clone());
        Ok(())
    }

    fn backend(&self) -> &'static str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn set_overwrites_whole_document() {
        let store = MemoryDocumentStore::new();
        let path = DocumentPath::chain("a@example.com", "c1").unwrap();

        let first = json!({"name": "one", "extra": true});
        store.set(&path, first.as_object().unwrap()).await.unwrap();
        let second = json!({"name": "two"});
        store.set(&path, second.as_object().unwrap()).await.unwrap();

        let stored = store.get(&path).await.unwrap();
        assert_eq!(stored.get("name"), Some(&json!("two")));
        assert!(stored.get("extra").is_none());
        assert_eq!(store.paths().await, vec!["users/a@example.com/chains/c1"]);
    }
}
