// src/services/index.rs

//! Document-search collaborator seam.
//!
//! The on-disk index format and the embedding model behind it are external;
//! this module defines the delete-by-id/insert surface the reconciler
//! drives, plus a JSON-artifact implementation used for local runs and
//! tests.

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::config::IndexConfig;
use crate::error::Result;
use crate::models::NormalizedDocument;

/// Embedding configuration handed through to the index collaborator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingSettings {
    pub model: String,
    pub dimensions: usize,
}

impl From<&IndexConfig> for EmbeddingSettings {
    fn from(config: &IndexConfig) -> Self {
        Self {
            model: config.embedding_model.clone(),
            dimensions: config.embedding_dimensions,
        }
    }
}

/// Opaque document index exposing delete-by-id and insert.
///
/// Artifacts are named files making up one self-contained snapshot bundle;
/// the reconciler persists and reloads them without interpreting their
/// contents.
#[async_trait]
pub trait DocumentIndex: Send + Sync {
    /// Remove every document whose content id appears in `ids`.
    /// Returns the number of documents removed.
    async fn delete_by_ids(&mut self, ids: &[String]) -> Result<usize>;

    /// Insert documents. Ids not previously deleted must not already exist.
    async fn insert(&mut self, docs: &[NormalizedDocument]) -> Result<()>;

    /// Export the index as named artifact files.
    fn export_artifacts(&self) -> Result<Vec<(String, Vec<u8>)>>;

    /// Replace index state from previously exported artifacts.
    fn load_artifacts(&mut self, artifacts: &[(String, Vec<u8>)]) -> Result<()>;
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct DocumentsArtifact {
    embedding: Option<EmbeddingSettings>,
    documents: BTreeMap<String, NormalizedDocument>,
}

/// Index implementation storing documents in a single JSON artifact.
pub struct JsonDocumentIndex {
    embedding: EmbeddingSettings,
    documents: BTreeMap<String, NormalizedDocument>,
}

impl JsonDocumentIndex {
    const ARTIFACT_NAME: &'static str = "documents.json";

    pub fn new(embedding: EmbeddingSettings) -> Self {
        Self {
            embedding,
            documents: BTreeMap::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    pub fn contains(&self, content_id: &str) -> bool {
        self.documents.contains_key(content_id)
    }
}

#[async_trait]
impl DocumentIndex for JsonDocumentIndex {
    async fn delete_by_ids(&mut self, ids: &[String]) -> Result<usize> {
        let mut removed = 0;
        for id in ids {
            if self.documents.remove(id).is_some() {
                removed += 1;
            }
        }
        Ok(removed)
    }

    async fn insert(&mut self, docs: &[NormalizedDocument]) -> Result<()> {
        for doc in docs {
            self.documents.insert(doc.content_id.clone(), doc.clone());
        }
        Ok(())
    }

    fn export_artifacts(&self) -> Result<Vec<(String, Vec<u8>)>> {
        let artifact = DocumentsArtifact {
            embedding: Some(self.embedding.clone()),
            documents: self.documents.clone(),
        };
        Ok(vec![(
            Self::ARTIFACT_NAME.to_string(),
            serde_json::to_vec_pretty(&artifact)?,
        )])
    }

    fn load_artifacts(&mut self, artifacts: &[(String, Vec<u8>)]) -> Result<()> {
        self.documents.clear();
        for (name, bytes) in artifacts {
            if name == Self::ARTIFACT_NAME {
                let artifact: DocumentsArtifact = serde_json::from_slice(bytes)?;
                self.documents = artifact.documents;
            }
        }
        Ok(())
    }
}
