//! Message display helpers
//!
//! Header lists, date rendering, address line markup and the MDN
//! (read receipt) dispatch used when a message is shown to the user.

mod html;
mod mdn;
mod ui;

pub use html::{escape_html, AddressLinkOptions};
pub use mdn::{
    Maillog, MdnReport, MdnRequest, MdnSender, MdnServices, MessageStore, SentmailLog, MDN_SENT,
};
pub use ui::{ListInformation, MessageUi};

/// State of the mailbox a message is displayed from
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MailboxView {
    pub name: String,
    pub readonly: bool,
    /// Flags the server lets the client store permanently
    pub permanent_flags: Vec<String>,
    /// Deleted messages are hidden from the listing
    pub hide_deleted: bool,
}

impl MailboxView {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Whether `flag` may be stored. `\*` allows any keyword.
    pub fn allows_flag(&self, flag: &str) -> bool {
        self.permanent_flags
            .iter()
            .any(|f| f == "\\*" || f.eq_ignore_ascii_case(flag))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allows_flag() {
        let mut view = MailboxView::new("INBOX");
        assert!(!view.allows_flag(MDN_SENT));

        view.permanent_flags = vec!["\\Seen".to_string(), "$mdnsent".to_string()];
        assert!(view.allows_flag(MDN_SENT));

        view.permanent_flags = vec!["\\*".to_string()];
        assert!(view.allows_flag("$Junk"));
    }
}
