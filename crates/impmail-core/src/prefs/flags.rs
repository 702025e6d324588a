//! Folder tree flag preferences
//!
//! Sets of mailboxes carrying a boolean flag (expanded in the folder tree,
//! polled for new mail). Changes accumulate in memory and are written once
//! by [`FlagPrefs::shutdown`] at the end of the request.

use impmail_common::serial::{self, Array, Key, Value};
use impmail_common::Result;
use impmail_storage::PrefsBackend;
use std::sync::Arc;
use tracing::{debug, warn};

/// Which flag list a map manages
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlagKind {
    /// Folders expanded in the folder tree
    Expanded,
    /// Folders polled for new mail
    Poll,
}

impl FlagKind {
    /// Preference name in the backend
    pub fn pref_name(self) -> &'static str {
        match self {
            FlagKind::Expanded => "expanded_folders",
            FlagKind::Poll => "nav_poll",
        }
    }
}

/// Boolean flag map over mailbox names
pub struct FlagPrefs {
    backend: Arc<dyn PrefsBackend>,
    kind: FlagKind,
    flagged: Vec<String>,
    locked: bool,
    dirty: bool,
}

impl FlagPrefs {
    /// Load the stored list. Malformed data yields an empty map; backend
    /// read errors are returned.
    pub async fn load(backend: Arc<dyn PrefsBackend>, kind: FlagKind) -> Result<Self> {
        let name = kind.pref_name();
        let flagged = match backend.get_value(name).await? {
            Some(raw) if !raw.is_empty() => match serial::decode_array(&raw) {
                // A stored key counts as flagged unless its value is null
                Ok(array) => array
                    .into_iter()
                    .filter(|(_, v)| !matches!(v, Value::Null))
                    .map(|(k, _)| k.as_str().into_owned())
                    .collect(),
                Err(e) => {
                    warn!(pref = %name, error = %e, "Discarding malformed flag list");
                    Vec::new()
                }
            },
            _ => Vec::new(),
        };
        let locked = backend.is_locked(name);

        Ok(Self {
            backend,
            kind,
            flagged,
            locked,
            dirty: false,
        })
    }

    pub fn kind(&self) -> FlagKind {
        self.kind
    }

    /// True if the preference is locked
    pub fn locked(&self) -> bool {
        self.locked
    }

    /// Whether `mailbox` is flagged
    pub fn get(&self, mailbox: &str) -> bool {
        self.flagged.iter().any(|m| m == mailbox)
    }

    /// Every mailbox has a value (possibly false)
    pub fn contains(&self, _mailbox: &str) -> bool {
        true
    }

    /// Flag or unflag `mailbox`. Ignored when locked or unchanged.
    pub fn set(&mut self, mailbox: &str, value: bool) {
        if self.locked || self.get(mailbox) == value {
            return;
        }

        if value {
            self.flagged.push(mailbox.to_string());
        } else {
            self.flagged.retain(|m| m != mailbox);
        }
        self.dirty = true;
    }

    pub fn unset(&mut self, mailbox: &str) {
        self.set(mailbox, false);
    }

    /// Flagged mailboxes in storage order
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.flagged.iter().map(String::as_str)
    }

    /// Whether there are unsaved changes
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// End-of-request task: persist pending changes
    pub async fn shutdown(&mut self) -> Result<()> {
        if !self.dirty {
            return Ok(());
        }

        let array: Array = self
            .flagged
            .iter()
            .map(|m| (Key::from_name(m), Value::Bool(true)))
            .collect();
        self.backend
            .set_value(self.kind.pref_name(), &serial::encode_array(&array))
            .await?;
        self.dirty = false;

        debug!(pref = %self.kind.pref_name(), count = self.flagged.len(), "Saved flag list");

        Ok(())
    }
}
