//! Per-request service bundle

use crate::hooks::Hooks;
use crate::mailbox::MailboxResolver;
use crate::message::MessageUi;
use crate::prefs::{FlagKind, FlagPrefs, SortPrefs};
use impmail_common::Result;
use impmail_storage::PrefsBackend;
use std::sync::Arc;

/// Everything a request needs to work with one user's preferences
#[derive(Clone)]
pub struct RequestContext {
    pub prefs: Arc<dyn PrefsBackend>,
    pub hooks: Hooks,
    pub mailboxes: Arc<dyn MailboxResolver>,
    /// Host name reported in generated notifications
    pub server_name: String,
}

impl RequestContext {
    pub fn new(
        prefs: Arc<dyn PrefsBackend>,
        hooks: Hooks,
        mailboxes: Arc<dyn MailboxResolver>,
        server_name: impl Into<String>,
    ) -> Self {
        Self {
            prefs,
            hooks,
            mailboxes,
            server_name: server_name.into(),
        }
    }

    pub async fn sort_prefs(&self) -> Result<SortPrefs> {
        SortPrefs::load(self.prefs.clone(), self.hooks.clone()).await
    }

    pub async fn flag_prefs(&self, kind: FlagKind) -> Result<FlagPrefs> {
        FlagPrefs::load(self.prefs.clone(), kind).await
    }

    pub fn ui(&self) -> MessageUi {
        MessageUi::new(self.prefs.clone(), self.hooks.clone(), self.server_name.clone())
    }

    /// Drop sort preferences of mailboxes that no longer exist
    pub async fn gc_sort_prefs(&self) -> Result<usize> {
        let mut prefs = self.sort_prefs().await?;
        prefs.gc(self.mailboxes.as_ref()).await
    }
}
