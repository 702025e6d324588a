//! Preference stores layered over a [`PrefsBackend`](impmail_storage::PrefsBackend)

mod flags;
mod sort;

pub use flags::{FlagKind, FlagPrefs};
pub use sort::{SortPrefs, SORTPREF};
