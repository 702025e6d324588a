//! Message header block

use crate::address::AddressList;
use mail_parser::MessageParser;

/// Ordered, case-insensitive header collection
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MessageHeaders {
    headers: Vec<(String, String)>,
}

impl MessageHeaders {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a raw header block. Values are kept as written, unfolded.
    /// Parsing stops at the first empty line.
    pub fn parse(raw: &str) -> Self {
        let mut block = raw.to_string();
        if !block.ends_with('\n') {
            block.push_str("\r\n");
        }
        block.push_str("\r\n");

        let Some(message) = MessageParser::default().parse(block.as_bytes()) else {
            return Self::new();
        };
        let headers = message
            .headers()
            .iter()
            .filter_map(|header| {
                let value = block.get(header.offset_start as usize..header.offset_end as usize)?;
                Some((header.name().to_string(), unfold(value)))
            })
            .collect();

        Self { headers }
    }

    /// Append a header
    pub fn add(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.headers.push((name.into(), value.into()));
    }

    /// Builder-style `add`
    pub fn with(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.add(name, value);
        self
    }

    /// First value of `name`
    pub fn get(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// All values of `name`
    pub fn get_all<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.headers
            .iter()
            .filter(move |(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Parse the address list stored under `name`; empty when absent
    pub fn addresses(&self, name: &str) -> AddressList {
        let joined = self.get_all(name).collect::<Vec<_>>().join(", ");
        AddressList::parse(&joined)
    }

    /// `Message-ID` value
    pub fn message_id(&self) -> Option<&str> {
        self.get("message-id")
    }

    /// Whether any mailing list (RFC 2369 / RFC 2919) header is present
    pub fn list_headers_exist(&self) -> bool {
        const LIST_HEADERS: &[&str] = &[
            "list-archive",
            "list-help",
            "list-id",
            "list-owner",
            "list-post",
            "list-subscribe",
            "list-unsubscribe",
        ];
        LIST_HEADERS.iter().any(|name| self.contains(name))
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.headers.iter().map(|(n, v)| (n.as_str(), v.as_str()))
    }
}

fn unfold(value: &str) -> String {
    value.replace("\r\n", "").replace('\n', "").trim().to_string()
}
