//! Member directory lookups.
//!
//! # Data Flow
//! ```text
//! caller id
//!     → Directory::search(Criteria { attribute, value })
//!     → Vec<Member>
//!     → greeting(&member) → spoken/variable text
//! ```

pub mod json;
pub mod member;

use async_trait::async_trait;
use thiserror::Error;

pub use json::JsonDirectory;
pub use member::{greeting, Member};

/// Attribute matched against the caller id.
pub const CALLER_ATTRIBUTE: &str = "mobile";

/// Errors from a directory backend.
#[derive(Debug, Error)]
pub enum DirectoryError {
    #[error("failed to read directory {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed directory data: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Equality search on one member attribute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Criteria {
    pub attribute: String,
    pub value: String,
}

impl Criteria {
    pub fn new(attribute: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            attribute: attribute.into(),
            value: value.into(),
        }
    }

    /// Search by caller id number.
    pub fn caller(number: &str) -> Self {
        Self::new(CALLER_ATTRIBUTE, number)
    }
}

/// A searchable member directory.
#[async_trait]
pub trait Directory: Send + Sync {
    async fn search(&self, criteria: &Criteria) -> Result<Vec<Member>, DirectoryError>;
}

/// First member whose caller attribute matches `number`.
pub async fn lookup_caller<D>(directory: &D, number: &str) -> Result<Option<Member>, DirectoryError>
where
    D: Directory + ?Sized,
{
    let mut members = directory.search(&Criteria::caller(number)).await?;
    if members.is_empty() {
        return Ok(None);
    }
    Ok(Some(members.swap_remove(0)))
}
