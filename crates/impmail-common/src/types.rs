//! Common types for impmail

use serde::{Deserialize, Serialize};
use std::fmt;

/// Mailbox identifier as stored in preferences
pub type MailboxName = String;

/// Message UID within a mailbox
pub type Uid = u32;

/// Sort criterion code
///
/// The numeric values are the IMAP client library's sort constants plus the
/// client-side date sort. Unknown codes are carried through untouched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SortBy(pub i64);

impl SortBy {
    pub const ARRIVAL: SortBy = SortBy(1);
    pub const CC: SortBy = SortBy(2);
    /// Server-side date sort
    pub const IMAP_DATE: SortBy = SortBy(3);
    pub const FROM: SortBy = SortBy(4);
    pub const REVERSE: SortBy = SortBy(5);
    pub const SIZE: SortBy = SortBy(6);
    pub const SUBJECT: SortBy = SortBy(7);
    pub const TO: SortBy = SortBy(8);
    pub const THREAD: SortBy = SortBy(9);
    pub const SEQUENCE: SortBy = SortBy(10);
    pub const DISPLAYFROM: SortBy = SortBy(11);
    pub const DISPLAYTO: SortBy = SortBy(12);
    pub const RELEVANCY: SortBy = SortBy(13);
    /// Client-side date sort
    pub const DATE: SortBy = SortBy(100);

    /// Raw code
    pub fn code(self) -> i64 {
        self.0
    }

    /// Short name, when the code is known
    pub fn name(self) -> Option<&'static str> {
        Some(match self {
            SortBy::ARRIVAL => "arrival",
            SortBy::CC => "cc",
            SortBy::IMAP_DATE => "imap_date",
            SortBy::FROM => "from",
            SortBy::REVERSE => "reverse",
            SortBy::SIZE => "size",
            SortBy::SUBJECT => "subject",
            SortBy::TO => "to",
            SortBy::THREAD => "thread",
            SortBy::SEQUENCE => "sequence",
            SortBy::DISPLAYFROM => "displayfrom",
            SortBy::DISPLAYTO => "displayto",
            SortBy::RELEVANCY => "relevancy",
            SortBy::DATE => "date",
            _ => return None,
        })
    }
}

impl fmt::Display for SortBy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.name() {
            Some(name) => f.write_str(name),
            None => write!(f, "sort({})", self.0),
        }
    }
}

/// Sort direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortDirection {
    Ascending,
    Descending,
}

impl SortDirection {
    /// Interpret a stored value: zero is ascending, anything else descending
    pub fn from_raw(raw: i64) -> Self {
        if raw == 0 {
            SortDirection::Ascending
        } else {
            SortDirection::Descending
        }
    }

    /// Stored value
    pub fn to_raw(self) -> i64 {
        match self {
            SortDirection::Ascending => 0,
            SortDirection::Descending => 1,
        }
    }
}

/// User-wide fallbacks for fields a mailbox entry leaves unset
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SortDefaults {
    pub sort_by: SortBy,
    pub sort_dir: SortDirection,
}

impl Default for SortDefaults {
    fn default() -> Self {
        Self {
            sort_by: SortBy::SEQUENCE,
            sort_dir: SortDirection::Ascending,
        }
    }
}

/// Per-mailbox sort specification
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortSpec {
    pub mailbox: MailboxName,
    pub sort_by: Option<SortBy>,
    pub sort_dir: Option<SortDirection>,
}

impl SortSpec {
    /// Spec with both fields absent
    pub fn new(mailbox: impl Into<MailboxName>) -> Self {
        Self {
            mailbox: mailbox.into(),
            sort_by: None,
            sort_dir: None,
        }
    }

    /// Resolve absent fields against the user defaults
    pub fn effective(&self, defaults: &SortDefaults) -> (SortBy, SortDirection) {
        (
            self.sort_by.unwrap_or(defaults.sort_by),
            self.sort_dir.unwrap_or(defaults.sort_dir),
        )
    }
}

/// Partial update applied by `set`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SortPatch {
    pub sort_by: Option<SortBy>,
    pub sort_dir: Option<SortDirection>,
}

impl SortPatch {
    /// Patch setting only the criterion
    pub fn by(sort_by: SortBy) -> Self {
        Self {
            sort_by: Some(sort_by),
            sort_dir: None,
        }
    }

    /// Patch setting only the direction
    pub fn dir(sort_dir: SortDirection) -> Self {
        Self {
            sort_by: None,
            sort_dir: Some(sort_dir),
        }
    }

    /// Also set the direction
    pub fn with_dir(mut self, sort_dir: SortDirection) -> Self {
        self.sort_dir = Some(sort_dir);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.sort_by.is_none() && self.sort_dir.is_none()
    }
}
