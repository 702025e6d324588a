//! Message Disposition Notifications (RFC 3798)

use async_trait::async_trait;
use impmail_common::address::{AddressList, Mailbox};
use impmail_common::headers::MessageHeaders;
use impmail_common::types::Uid;
use impmail_common::Result;
use std::sync::Arc;

/// Keyword marking a message whose MDN was sent
pub const MDN_SENT: &str = "$MDNSent";

/// Access to the flags of stored messages
#[async_trait]
pub trait MessageStore: Send + Sync {
    async fn fetch_flags(&self, mailbox: &str, uid: Uid) -> Result<Vec<String>>;

    async fn add_flags(&self, mailbox: &str, uid: Uid, flags: &[&str]) -> Result<()>;
}

/// Per-message history of sent notifications
#[async_trait]
pub trait Maillog: Send + Sync {
    /// Whether an MDN of `disposition` was already sent for `message_id`
    async fn sent_mdn(&self, message_id: &str, disposition: &str) -> Result<bool>;

    async fn log_mdn(&self, message_id: &str, disposition: &str) -> Result<()>;
}

/// Delivers a generated MDN
#[async_trait]
pub trait MdnSender: Send + Sync {
    async fn send(&self, report: &MdnReport) -> Result<()>;
}

/// Log of outgoing mail
#[async_trait]
pub trait SentmailLog: Send + Sync {
    async fn log_mdn(&self, recipient: &str, success: bool) -> Result<()>;
}

/// Collaborators used when dispatching an MDN
#[derive(Clone)]
pub struct MdnServices {
    pub store: Arc<dyn MessageStore>,
    /// Optional; without it duplicates are only detected via `$MDNSent`
    pub maillog: Option<Arc<dyn Maillog>>,
    pub sender: Arc<dyn MdnSender>,
    pub sentmail: Arc<dyn SentmailLog>,
    /// From address of the user's default identity
    pub from_address: String,
}

/// An MDN request carried by a message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MdnRequest {
    /// Raw `Disposition-Notification-To` value
    pub return_address: String,
    recipients: AddressList,
    return_paths: Vec<String>,
    required_options: bool,
}

impl MdnRequest {
    /// None when the message does not ask for a notification
    pub fn from_headers(headers: &MessageHeaders) -> Option<Self> {
        let return_address = headers.get("disposition-notification-to")?.trim();
        if return_address.is_empty() {
            return None;
        }

        let required_options = headers
            .get("disposition-notification-options")
            .map(|opts| {
                opts.split(';')
                    .filter_map(|param| param.split_once('='))
                    .any(|(_, value)| value.trim().to_ascii_lowercase().starts_with("required"))
            })
            .unwrap_or(false);

        Some(Self {
            return_address: return_address.to_string(),
            recipients: AddressList::parse(return_address),
            return_paths: headers.get_all("return-path").map(str::to_string).collect(),
            required_options,
        })
    }

    /// Whether the user must explicitly confirm before an MDN goes out
    ///
    /// Confirmation is required when the Return-Path is missing or repeated,
    /// when the request names more than one address, when that address
    /// differs from the Return-Path, or when the sender marked an option as
    /// required.
    pub fn user_confirmation_needed(&self) -> bool {
        if self.return_paths.len() != 1 || self.required_options {
            return true;
        }

        let mut recipients = self.recipients.mailboxes();
        let (Some(recipient), None) = (recipients.next(), recipients.next()) else {
            return true;
        };

        let return_path = AddressList::parse(&self.return_paths[0]);
        match return_path.first() {
            Some(path) => !same_address(path, recipient),
            None => true,
        }
    }
}

/// Local parts compare case-sensitively, domains case-insensitively
fn same_address(a: &Mailbox, b: &Mailbox) -> bool {
    match (a.address.rsplit_once('@'), b.address.rsplit_once('@')) {
        (Some((local_a, host_a)), Some((local_b, host_b))) => {
            local_a == local_b && host_a.eq_ignore_ascii_case(host_b)
        }
        _ => a.address == b.address,
    }
}

/// A generated notification
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MdnReport {
    pub to: String,
    pub from: String,
    pub original_message_id: Option<String>,
    pub original_subject: Option<String>,
    /// Host generating the report
    pub reporting_ua: String,
    /// The user confirmed the send
    pub manual: bool,
    pub disposition: &'static str,
}

impl MdnReport {
    /// `Disposition` field of the report
    pub fn disposition_field(&self) -> String {
        format!(
            "automatic-action/{}; {}",
            if self.manual {
                "MDN-sent-manually"
            } else {
                "MDN-sent-automatically"
            },
            self.disposition
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(headers: MessageHeaders) -> MdnRequest {
        MdnRequest::from_headers(&headers).unwrap()
    }

    #[test]
    fn test_no_request() {
        assert!(MdnRequest::from_headers(&MessageHeaders::new()).is_none());
        assert!(MdnRequest::from_headers(
            &MessageHeaders::new().with("Disposition-Notification-To", "  ")
        )
        .is_none());
    }

    #[test]
    fn test_matching_return_path() {
        let req = request(
            MessageHeaders::new()
                .with("Return-Path", "<bob@Example.COM>")
                .with("Disposition-Notification-To", "Bob <bob@example.com>"),
        );
        assert_eq!(req.return_address, "Bob <bob@example.com>");
        assert!(!req.user_confirmation_needed());
    }

    #[test]
    fn test_confirmation_needed() {
        // no Return-Path
        assert!(request(
            MessageHeaders::new().with("Disposition-Notification-To", "bob@example.com")
        )
        .user_confirmation_needed());

        // local part differs in case
        assert!(request(
            MessageHeaders::new()
                .with("Return-Path", "<Bob@example.com>")
                .with("Disposition-Notification-To", "bob@example.com")
        )
        .user_confirmation_needed());

        // two addresses
        assert!(request(
            MessageHeaders::new()
                .with("Return-Path", "<bob@example.com>")
                .with("Disposition-Notification-To", "bob@example.com, eve@example.net")
        )
        .user_confirmation_needed());

        // repeated Return-Path
        assert!(request(
            MessageHeaders::new()
                .with("Return-Path", "<bob@example.com>")
                .with("Return-Path", "<bob@example.com>")
                .with("Disposition-Notification-To", "bob@example.com")
        )
        .user_confirmation_needed());

        // required option
        assert!(request(
            MessageHeaders::new()
                .with("Return-Path", "<bob@example.com>")
                .with("Disposition-Notification-To", "bob@example.com")
                .with("Disposition-Notification-Options", "signed-receipt=required,pkcs7")
        )
        .user_confirmation_needed());
    }

    #[test]
    fn test_disposition_field() {
        let mut report = MdnReport {
            to: "bob@example.com".to_string(),
            from: "alice@example.org".to_string(),
            original_message_id: None,
            original_subject: None,
            reporting_ua: "mail.example.org".to_string(),
            manual: false,
            disposition: "displayed",
        };
        assert_eq!(
            report.disposition_field(),
            "automatic-action/MDN-sent-automatically; displayed"
        );
        report.manual = true;
        assert_eq!(
            report.disposition_field(),
            "automatic-action/MDN-sent-manually; displayed"
        );
    }
}
