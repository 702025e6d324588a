//! impmail Core - Preference stores, hooks and message UI helpers
//!
//! This crate provides the per-mailbox sort preference store, the folder
//! flag preference maps, the hook registry and the helpers used when
//! displaying a message (header lists, address lines, MDN dispatch).

pub mod context;
pub mod hooks;
pub mod mailbox;
pub mod message;
pub mod prefs;

pub use context::RequestContext;
pub use hooks::{Hooks, MboxSortHook, MdnCheckHook};
pub use mailbox::{MailboxInfo, MailboxList, MailboxResolver};
pub use message::{MdnServices, MessageUi};
pub use prefs::{FlagKind, FlagPrefs, SortPrefs};
