//! Mailbox metadata resolution

use async_trait::async_trait;
use impmail_common::Result;
use impmail_storage::MailboxRow;
use std::collections::{HashMap, HashSet};

/// What the mail server knows about a mailbox name
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MailboxInfo {
    pub name: String,
    pub exists: bool,
    /// A saved search query, as opposed to a real folder or virtual folder
    pub is_query: bool,
}

/// Resolves mailbox names to their current state
#[async_trait]
pub trait MailboxResolver: Send + Sync {
    /// One entry per requested name, in request order
    async fn resolve(&self, names: &[String]) -> Result<Vec<MailboxInfo>>;
}

/// In-memory resolver over a known folder list
#[derive(Debug, Clone, Default)]
pub struct MailboxList {
    folders: HashSet<String>,
    /// Saved searches; the flag is true for virtual folders
    searches: HashMap<String, bool>,
}

impl MailboxList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_folder(mut self, name: impl Into<String>) -> Self {
        self.folders.insert(name.into());
        self
    }

    /// Add a saved search query
    pub fn with_query(mut self, name: impl Into<String>) -> Self {
        self.searches.insert(name.into(), false);
        self
    }

    /// Add a virtual folder (a saved search kept as a folder)
    pub fn with_virtual_folder(mut self, name: impl Into<String>) -> Self {
        self.searches.insert(name.into(), true);
        self
    }

    /// Build from the stored folder directory
    pub fn from_rows(rows: impl IntoIterator<Item = MailboxRow>) -> Self {
        rows.into_iter().fold(Self::new(), |list, row| {
            if row.is_query {
                list.with_query(row.name)
            } else {
                list.with_folder(row.name)
            }
        })
    }

    fn info(&self, name: &str) -> MailboxInfo {
        let (exists, is_query) = if self.folders.contains(name) {
            (true, false)
        } else if let Some(&vfolder) = self.searches.get(name) {
            (true, !vfolder)
        } else {
            (false, false)
        };

        MailboxInfo {
            name: name.to_string(),
            exists,
            is_query,
        }
    }
}

#[async_trait]
impl MailboxResolver for MailboxList {
    async fn resolve(&self, names: &[String]) -> Result<Vec<MailboxInfo>> {
        Ok(names.iter().map(|name| self.info(name)).collect())
    }
}
