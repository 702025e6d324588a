//! HTML fragments for address lines

use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};

/// Query component encoding: everything but unreserved characters
const QUERY: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~');

/// Escape text for HTML element content and attribute values
pub fn escape_html(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#039;"),
            _ => out.push(c),
        }
    }
    out
}

/// Append `key=value` pairs to `base` as a query string
pub(crate) fn add_params(base: &str, params: &[(&str, &str)]) -> String {
    let mut url = base.to_string();
    let mut sep = if base.contains('?') { '&' } else { '?' };
    for (key, value) in params {
        url.push(sep);
        url.push_str(key);
        url.push('=');
        url.extend(utf8_percent_encode(value, QUERY));
        sep = '&';
    }
    url
}

/// Opening anchor tag with a title
pub(crate) fn link(url: &str, title: &str) -> String {
    format!(
        "<a href=\"{}\" title=\"{}\">",
        escape_html(url),
        escape_html(title)
    )
}

/// How [`MessageUi::build_address_links`](super::MessageUi::build_address_links)
/// renders an address line
#[derive(Debug, Clone, Default)]
pub struct AddressLinkOptions {
    /// Link each address to a new compose window
    pub link: bool,
    /// Plain comma-joined text
    pub minimal: bool,
    /// Compose page the address links point at
    pub compose_url: String,
    /// Page handling the add-to-address-book action; None hides the icon
    pub add_url: Option<String>,
    /// A contacts source accepts imports
    pub contacts_available: bool,
}
