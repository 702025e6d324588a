//! Message view helpers

use super::html::{add_params, escape_html, link, AddressLinkOptions};
use super::mdn::{MdnReport, MdnRequest, MdnServices, MDN_SENT};
use super::MailboxView;
use crate::hooks::Hooks;
use chrono::format::{Item, StrftimeItems};
use chrono::{DateTime, TimeZone};
use impmail_common::address::{AddressEntry, AddressList, Mailbox};
use impmail_common::headers::MessageHeaders;
use impmail_common::types::Uid;
use impmail_common::Result;
use impmail_storage::PrefsBackend;
use std::cmp::Ordering;
use std::fmt::Display;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Address lines with more entries than this are collapsed
const LARGE_ADDRESS_LIST: usize = 15;

const DISPLAYED: &str = "displayed";

/// Mailing list details of a message
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListInformation {
    /// Any list header is present
    pub exists: bool,
    /// Posting address taken from `List-Post`
    pub reply_list: Option<String>,
}

/// Helpers for displaying a single message
#[derive(Clone)]
pub struct MessageUi {
    prefs: Arc<dyn PrefsBackend>,
    hooks: Hooks,
    server_name: String,
}

impl MessageUi {
    pub fn new(prefs: Arc<dyn PrefsBackend>, hooks: Hooks, server_name: impl Into<String>) -> Self {
        Self {
            prefs,
            hooks,
            server_name: server_name.into(),
        }
    }

    async fn pref(&self, name: &str) -> Result<String> {
        Ok(self.prefs.get_value(name).await?.unwrap_or_default())
    }

    /// Headers shown in the basic view, keyed by lowercase name
    pub fn basic_headers() -> &'static [(&'static str, &'static str)] {
        &[
            ("date", "Date"),
            ("from", "From"),
            ("to", "To"),
            ("cc", "Cc"),
            ("bcc", "Bcc"),
            ("reply-to", "Reply-To"),
            ("subject", "Subject"),
        ]
    }

    /// Extra headers the user asked to see
    pub async fn user_headers(&self) -> Result<Vec<String>> {
        let raw = self.pref("mail_hdr").await?.replace(':', "");

        let mut headers: Vec<String> = Vec::new();
        for name in raw.split(['\r', '\n']).map(str::trim) {
            if !name.is_empty() && !headers.iter().any(|h| h == name) {
                headers.push(name.to_string());
            }
        }
        headers.sort_by(|a, b| natural_cmp_ignore_case(a, b));

        Ok(headers)
    }

    /// Render a message date relative to `now`, in `now`'s time zone
    pub async fn local_time<Tz>(&self, date: &DateTime<Tz>, now: &DateTime<Tz>) -> Result<String>
    where
        Tz: TimeZone,
        Tz::Offset: Display,
    {
        let time_format = self.pref("time_format").await?;
        let date = date.with_timezone(&now.timezone());
        let time_str = strftime(&date, &time_format, "%X");
        let tz = strftime(now, "%Z", "%Z");

        if date.date_naive() == now.date_naive() {
            Ok(format!("Today, {} {}", time_str, tz))
        } else {
            let date_format = self.pref("date_format").await?;
            Ok(format!(
                "{} ({} {})",
                strftime(&date, &date_format, "%x"),
                time_str,
                tz
            ))
        }
    }

    /// Mailing list details from the `List-*` headers
    pub fn list_information(headers: &MessageHeaders) -> ListInformation {
        let reply_list = headers.get("list-post").and_then(list_post_address);

        ListInformation {
            exists: headers.list_headers_exist(),
            reply_list,
        }
    }

    /// HTML for an address header line
    pub async fn build_address_links(
        &self,
        list: &AddressList,
        opts: &AddressLinkOptions,
    ) -> Result<String> {
        let add_url = match &opts.add_url {
            Some(url) if opts.link && opts.contacts_available => {
                if is_truthy(&self.pref("add_source").await?) {
                    Some(add_params(url, &[("actionID", "add_address")]))
                } else {
                    None
                }
            }
            _ => None,
        };
        let add_url = add_url.as_deref();

        let mut parts = Vec::with_capacity(list.entries().len());
        for entry in list.entries() {
            match entry {
                AddressEntry::Group { name, members } => {
                    let name = if opts.minimal {
                        name.clone()
                    } else {
                        escape_html(name)
                    };
                    let members: Vec<String> = members
                        .iter()
                        .map(|member| address_markup(member, opts, add_url))
                        .collect();
                    if members.is_empty() {
                        parts.push(format!("{}:", name));
                    } else {
                        parts.push(format!("{}: {}", name, members.join(", ")));
                    }
                }
                AddressEntry::Mailbox(mailbox) => {
                    parts.push(address_markup(mailbox, opts, add_url));
                }
            }
        }

        if opts.minimal {
            return Ok(parts.join(", "));
        }
        if parts.is_empty() {
            return Ok("Undisclosed Recipients".to_string());
        }

        let line = format!(
            "<span class=\"nowrap\">{}</span>",
            parts.join(",</span> <span class=\"nowrap\">")
        );
        if opts.link && parts.len() > LARGE_ADDRESS_LIST {
            return Ok(format!(
                "<span><span class=\"widget largeaddrlist\">Show Addresses ({})</span>\
                 <span class=\"widget largeaddrlist\" style=\"display:none\">Hide Addresses</span>\
                 <span style=\"display:none\">{}</span></span>",
                parts.len(),
                line
            ));
        }

        Ok(line)
    }

    /// Whether the view should move on after deleting the current message
    pub async fn move_after_action(&self, mailbox: &MailboxView) -> Result<bool> {
        Ok(!mailbox.hide_deleted && !is_truthy(&self.pref("use_trash").await?))
    }

    /// Handle the MDN request of a displayed message
    ///
    /// Returns true when the user has to be asked before a notification is
    /// sent. Sends the notification itself when no confirmation is needed.
    pub async fn mdn_check(
        &self,
        mailbox: &MailboxView,
        uid: Uid,
        headers: &MessageHeaders,
        confirmed: bool,
        services: &MdnServices,
    ) -> Result<bool> {
        let send_mdn = self.pref("send_mdn").await?;
        if !is_truthy(&send_mdn) || mailbox.readonly {
            return Ok(false);
        }

        let Some(request) = MdnRequest::from_headers(headers) else {
            return Ok(false);
        };
        let message_id = headers.message_id().unwrap_or_default();

        let mdn_flag = mailbox.allows_flag(MDN_SENT);
        let already_sent = if mdn_flag {
            match services.store.fetch_flags(&mailbox.name, uid).await {
                Ok(flags) => flags.iter().any(|f| f.eq_ignore_ascii_case(MDN_SENT)),
                Err(e) => {
                    warn!(mailbox = %mailbox.name, uid, error = %e, "Failed to fetch message flags");
                    false
                }
            }
        } else if let Some(maillog) = &services.maillog {
            maillog.sent_mdn(message_id, DISPLAYED).await?
        } else {
            false
        };
        if already_sent {
            debug!(mailbox = %mailbox.name, uid, "MDN already sent");
            return Ok(false);
        }

        if !confirmed && (send_mdn.trim() == "1" || request.user_confirmation_needed()) {
            match self.hooks.call_mdn_check(headers) {
                Ok(true) => return Ok(true),
                Ok(false) => {}
                Err(e) if e.is_hook_not_set() => return Ok(true),
                Err(e) => return Err(e),
            }
        }

        let report = MdnReport {
            to: request.return_address.clone(),
            from: services.from_address.clone(),
            original_message_id: headers.message_id().map(str::to_string),
            original_subject: headers.get("subject").map(str::to_string),
            reporting_ua: self.server_name.clone(),
            manual: confirmed,
            disposition: DISPLAYED,
        };

        let success = match send_report(&report, mailbox, uid, mdn_flag, message_id, services).await {
            Ok(()) => {
                info!(mailbox = %mailbox.name, uid, to = %report.to, "MDN sent");
                true
            }
            Err(e) => {
                warn!(mailbox = %mailbox.name, uid, error = %e, "Failed to send MDN");
                false
            }
        };

        services
            .sentmail
            .log_mdn(&request.return_address, success)
            .await?;

        Ok(false)
    }
}

async fn send_report(
    report: &MdnReport,
    mailbox: &MailboxView,
    uid: Uid,
    mdn_flag: bool,
    message_id: &str,
    services: &MdnServices,
) -> Result<()> {
    services.sender.send(report).await?;

    if let Some(maillog) = &services.maillog {
        maillog.log_mdn(message_id, DISPLAYED).await?;
    }
    if mdn_flag {
        services.store.add_flags(&mailbox.name, uid, &[MDN_SENT]).await?;
    }

    Ok(())
}

fn address_markup(mailbox: &Mailbox, opts: &AddressLinkOptions, add_url: Option<&str>) -> String {
    let full = mailbox.to_string();
    let mut out = if opts.link {
        let compose = add_params(&opts.compose_url, &[("to", full.as_str())]);
        format!(
            "{}{}</a>",
            link(&compose, &format!("New Message to {}", full)),
            escape_html(&full)
        )
    } else if opts.minimal {
        full
    } else {
        escape_html(&full)
    };

    if let Some(add_url) = add_url {
        let url = add_params(
            add_url,
            &[
                ("name", mailbox.personal.as_deref().unwrap_or("")),
                ("address", mailbox.bare_address()),
            ],
        );
        out.push_str(&link(
            &url,
            &format!("Add {} to my Address Book", mailbox.bare_address()),
        ));
        out.push_str("<span class=\"iconImg addrbookaddImg\"></span></a>");
    }

    out
}

/// First `mailto:` URL of a `List-Post` value. `NO` ends the list.
fn list_post_address(value: &str) -> Option<String> {
    let mut rest = value;
    loop {
        let trimmed = rest.trim_start_matches([' ', '\t', ',']);
        if trimmed.get(..2).is_some_and(|p| p.eq_ignore_ascii_case("NO")) {
            return None;
        }
        let start = trimmed.find('<')?;
        let end = trimmed[start..].find('>')? + start;
        let url = trimmed[start + 1..end].trim();
        if let Some((scheme, address)) = url.split_once(':') {
            if scheme.eq_ignore_ascii_case("mailto") && !address.is_empty() {
                return Some(address.to_string());
            }
        }
        rest = &trimmed[end + 1..];
    }
}

/// Preference values "" and "0" are off
fn is_truthy(value: &str) -> bool {
    !value.is_empty() && value != "0"
}

/// Format with a user-supplied strftime pattern, falling back on invalid input
fn strftime<Tz>(date: &DateTime<Tz>, format: &str, fallback: &str) -> String
where
    Tz: TimeZone,
    Tz::Offset: Display,
{
    let items: Vec<Item<'_>> = StrftimeItems::new(format).collect();
    if format.is_empty() || items.iter().any(|item| matches!(item, Item::Error)) {
        return date.format(fallback).to_string();
    }
    date.format_with_items(items.into_iter()).to_string()
}

/// Case-insensitive comparison with digit runs compared by value
fn natural_cmp_ignore_case(a: &str, b: &str) -> Ordering {
    let a: Vec<char> = a.to_lowercase().chars().collect();
    let b: Vec<char> = b.to_lowercase().chars().collect();
    let (mut i, mut j) = (0, 0);

    while i < a.len() && j < b.len() {
        if a[i].is_ascii_digit() && b[j].is_ascii_digit() {
            let start_a = i;
            while i < a.len() && a[i].is_ascii_digit() {
                i += 1;
            }
            let start_b = j;
            while j < b.len() && b[j].is_ascii_digit() {
                j += 1;
            }
            let num_a: String = a[start_a..i].iter().skip_while(|c| **c == '0').collect();
            let num_b: String = b[start_b..j].iter().skip_while(|c| **c == '0').collect();
            let ord = num_a.len().cmp(&num_b.len()).then_with(|| num_a.cmp(&num_b));
            if ord != Ordering::Equal {
                return ord;
            }
        } else {
            let ord = a[i].cmp(&b[j]);
            if ord != Ordering::Equal {
                return ord;
            }
            i += 1;
            j += 1;
        }
    }

    (a.len() - i).cmp(&(b.len() - j))
}
