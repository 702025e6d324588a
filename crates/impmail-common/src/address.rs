//! RFC 5322 address lists
//!
//! Address header values (`From`, `To`, `Disposition-Notification-To`, ...)
//! are parsed with `mail-parser`, which also decodes RFC 2047 encoded display
//! names. Entries without an address are skipped.

use mail_parser::{Addr, Address, MessageParser};
use std::fmt;

/// Characters that force the display name to be quoted
const SPECIALS: &[char] = &['(', ')', '<', '>', '[', ']', ':', ';', '@', '\\', ',', '.', '"'];

/// A single mailbox: optional display name plus bare address
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mailbox {
    pub personal: Option<String>,
    pub address: String,
}

impl Mailbox {
    pub fn new(personal: Option<&str>, address: impl Into<String>) -> Self {
        Self {
            personal: personal
                .map(str::trim)
                .filter(|p| !p.is_empty())
                .map(str::to_string),
            address: address.into(),
        }
    }

    /// Bare `local@domain` form
    pub fn bare_address(&self) -> &str {
        &self.address
    }

    /// Domain part, lowercased
    pub fn host(&self) -> Option<String> {
        self.address
            .rsplit_once('@')
            .map(|(_, host)| host.to_ascii_lowercase())
    }

    fn from_addr(addr: &Addr<'_>) -> Option<Self> {
        let address = addr.address.as_deref()?.trim();
        if address.is_empty() {
            return None;
        }
        Some(Self::new(addr.name.as_deref(), address))
    }
}

impl fmt::Display for Mailbox {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.personal {
            Some(personal) if personal.contains(SPECIALS) => {
                let escaped = personal.replace('\\', "\\\\").replace('"', "\\\"");
                write!(f, "\"{}\" <{}>", escaped, self.address)
            }
            Some(personal) => write!(f, "{} <{}>", personal, self.address),
            None => f.write_str(&self.address),
        }
    }
}

/// Top-level entry of an address list
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AddressEntry {
    Mailbox(Mailbox),
    Group { name: String, members: Vec<Mailbox> },
}

impl fmt::Display for AddressEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AddressEntry::Mailbox(mailbox) => mailbox.fmt(f),
            AddressEntry::Group { name, members } => {
                write!(f, "{}:", name)?;
                for (i, member) in members.iter().enumerate() {
                    f.write_str(if i == 0 { " " } else { ", " })?;
                    member.fmt(f)?;
                }
                f.write_str(";")
            }
        }
    }
}

/// Parsed address list
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AddressList {
    entries: Vec<AddressEntry>,
}

impl AddressList {
    pub fn new(entries: Vec<AddressEntry>) -> Self {
        Self { entries }
    }

    /// Parse a header value
    pub fn parse(input: &str) -> Self {
        // Parsed as the value of a synthetic `To` header
        let value = input.replace(['\r', '\n'], " ");
        let block = format!("To: {}\r\n\r\n", value.trim());

        MessageParser::default()
            .parse(block.as_bytes())
            .and_then(|message| message.to().map(Self::from_address))
            .unwrap_or_default()
    }

    /// Convert a parsed header value. Unnamed groups contribute their members
    /// as plain mailboxes.
    pub fn from_address(address: &Address<'_>) -> Self {
        let mut entries = Vec::new();
        match address {
            Address::List(addrs) => {
                entries.extend(
                    addrs
                        .iter()
                        .filter_map(Mailbox::from_addr)
                        .map(AddressEntry::Mailbox),
                );
            }
            Address::Group(groups) => {
                for group in groups {
                    let members = group.addresses.iter().filter_map(Mailbox::from_addr);
                    match group.name.as_deref().map(str::trim) {
                        Some(name) if !name.is_empty() => entries.push(AddressEntry::Group {
                            name: name.to_string(),
                            members: members.collect(),
                        }),
                        _ => entries.extend(members.map(AddressEntry::Mailbox)),
                    }
                }
            }
        }
        Self { entries }
    }

    /// Top-level entries (mailboxes and groups)
    pub fn entries(&self) -> &[AddressEntry] {
        &self.entries
    }

    /// All mailboxes, group members flattened
    pub fn mailboxes(&self) -> impl Iterator<Item = &Mailbox> {
        self.entries.iter().flat_map(|entry| match entry {
            AddressEntry::Mailbox(mailbox) => std::slice::from_ref(mailbox).iter(),
            AddressEntry::Group { members, .. } => members.iter(),
        })
    }

    pub fn len(&self) -> usize {
        self.mailboxes().count()
    }

    pub fn is_empty(&self) -> bool {
        self.mailboxes().next().is_none()
    }

    pub fn first(&self) -> Option<&Mailbox> {
        self.mailboxes().next()
    }
}
