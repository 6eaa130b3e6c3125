//! Directory backed by a JSON file of member records.

use std::path::Path;

use async_trait::async_trait;

use crate::directory::member::Member;
use crate::directory::{Criteria, Directory, DirectoryError};

/// In-memory directory loaded once from disk.
#[derive(Debug, Clone, Default)]
pub struct JsonDirectory {
    members: Vec<Member>,
}

impl JsonDirectory {
    pub fn new(members: Vec<Member>) -> Self {
        Self { members }
    }

    /// Load a JSON array of member records.
    pub fn load(path: &Path) -> Result<Self, DirectoryError> {
        let content = std::fs::read_to_string(path).map_err(|source| DirectoryError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let members: Vec<Member> = serde_json::from_str(&content)?;
        tracing::info!(path = %path.display(), members = members.len(), "Directory loaded");
        Ok(Self { members })
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }
}

#[async_trait]
impl Directory for JsonDirectory {
    async fn search(&self, criteria: &Criteria) -> Result<Vec<Member>, DirectoryError> {
        Ok(self
            .members
            .iter()
            .filter(|m| m.attribute(&criteria.attribute) == Some(criteria.value.as_str()))
            .cloned()
            .collect())
    }
}
