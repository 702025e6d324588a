//! ZIP attachment contents listing

use crate::templates::Templates;
use impmail_common::Result;
use serde::Serialize;

const ZIP_TEMPLATE: &str = "mime/zip.html";

/// A file inside a ZIP attachment
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ZipEntry {
    pub name: String,
    /// Uncompressed size in bytes
    pub size: u64,
    /// Trusted HTML for the download cell (a link, or empty)
    pub download: String,
}

/// Listing of a ZIP attachment's files
#[derive(Debug, Clone, Default)]
pub struct ZipContents {
    pub files: Vec<ZipEntry>,
}

#[derive(Serialize)]
struct Row<'a> {
    name: &'a str,
    size: String,
    download: &'a str,
}

#[derive(Serialize)]
struct Listing<'a> {
    files: Vec<Row<'a>>,
}

impl ZipContents {
    pub fn new(files: Vec<ZipEntry>) -> Self {
        Self { files }
    }

    /// Render the listing table
    pub fn render(&self, templates: &Templates) -> Result<String> {
        let files = self
            .files
            .iter()
            .map(|f| Row {
                name: &f.name,
                size: format_size(f.size),
                download: &f.download,
            })
            .collect();

        templates.render(ZIP_TEMPLATE, Listing { files })
    }
}

/// Human-readable size: whole KB below 1 MB, MB with one decimal above
pub fn format_size(bytes: u64) -> String {
    if bytes >= 1_048_576 {
        let tenths = (bytes as f64 / 1_048_576.0 * 10.0).round() as u64;
        format!("{}.{} MB", group_thousands(tenths / 10), tenths % 10)
    } else {
        let kb = (bytes as f64 / 1024.0).round() as u64;
        format!("{} KB", group_thousands(kb))
    }
}

fn group_thousands(n: u64) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_format_size() {
        assert_eq!(format_size(0), "0 KB");
        assert_eq!(format_size(1536), "2 KB");
        assert_eq!(format_size(1_048_575), "1,024 KB");
        assert_eq!(format_size(1_572_864), "1.5 MB");
        assert_eq!(format_size(5_000 * 1_048_576), "5,000.0 MB");
    }

    #[test]
    fn test_render_escapes_name_but_not_download() {
        let templates = Templates::new().unwrap();
        let contents = ZipContents::new(vec![
            ZipEntry {
                name: "<script>.txt".to_string(),
                size: 2048,
                download: "<a href=\"view?id=1\">Download</a>".to_string(),
            },
            ZipEntry {
                name: "docs/readme.md".to_string(),
                size: 10,
                download: String::new(),
            },
        ]);

        let html = contents.render(&templates).unwrap();

        assert!(html.contains("<h3>Contents of ZIP file:</h3>"));
        assert!(html.contains("<th>Filename</th>"));
        assert!(html.contains("<th>Size</th>"));
        assert!(html.contains("<th>Download</th>"));
        assert!(html.contains("<td>&lt;script&gt;.txt</td>"));
        assert!(html.contains("<td>2 KB</td>"));
        assert!(html.contains("<td class=\"zipdownload\"><a href=\"view?id=1\">Download</a></td>"));
        assert!(html.contains("readme.md</td>"));
        assert_eq!(html.matches("<tr>").count(), 3);
    }

    #[test]
    fn test_render_empty() {
        let templates = Templates::new().unwrap();
        let html = ZipContents::default().render(&templates).unwrap();

        assert!(html.contains("<tbody>"));
        assert_eq!(html.matches("<tr>").count(), 1);
    }
}
