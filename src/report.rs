use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use crate::links::NO_LINK;
use crate::{AppError, Result};

pub const HEADER: [&str; 2] = ["User Name", "Google Sheets Links"];

/// What a conversation's history scan produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkCell {
    Found(Vec<String>),
    NoLink,
    /// The history could not be fetched. Rendered like `NoLink`.
    FetchFailed(String),
}

impl LinkCell {
    pub fn render(&self) -> String {
        match self {
            LinkCell::Found(links) if !links.is_empty() => links.join(", "),
            _ => NO_LINK.to_string(),
        }
    }

    pub fn has_links(&self) -> bool {
        matches!(self, LinkCell::Found(links) if !links.is_empty())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResultRow {
    pub name: String,
    pub links: LinkCell,
}

impl ResultRow {
    pub fn new(display_name: &str, links: LinkCell) -> Self {
        Self {
            name: title_case(display_name),
            links,
        }
    }
}

/// Latin digraphs whose titlecase form differs from their uppercase form.
fn digraph_titlecase(c: char) -> Option<char> {
    match c {
        'Ǆ' | 'ǅ' | 'ǆ' => Some('ǅ'),
        'Ǉ' | 'ǈ' | 'ǉ' => Some('ǈ'),
        'Ǌ' | 'ǋ' | 'ǌ' => Some('ǋ'),
        'Ǳ' | 'ǲ' | 'ǳ' => Some('ǲ'),
        _ => None,
    }
}

fn push_titlecase(out: &mut String, c: char) {
    if let Some(title) = digraph_titlecase(c) {
        out.push(title);
        return;
    }
    // Expansions like 'ß' -> "SS" keep only their first letter upper-case.
    let mut upper = c.to_uppercase();
    if let Some(first) = upper.next() {
        out.push(first);
    }
    for rest in upper {
        out.extend(rest.to_lowercase());
    }
}

/// Title-cases every cased character that follows an uncased one and
/// lower-cases the rest, so `"mary-jane o'neil"` becomes `"Mary-Jane O'Neil"`.
pub fn title_case(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut prev_cased = false;

    for c in s.chars() {
        let cased = c.is_lowercase() || c.is_uppercase() || digraph_titlecase(c).is_some();
        if cased {
            if prev_cased {
                out.extend(c.to_lowercase());
            } else {
                push_titlecase(&mut out, c);
            }
        } else {
            out.push(c);
        }
        prev_cased = cased;
    }

    out
}

/// Stable sort by display name; rows sharing a name keep scan order.
pub fn sort_rows(rows: &mut [ResultRow]) {
    rows.sort_by(|a, b| a.name.cmp(&b.name));
}

pub fn write_rows<W: Write>(writer: W, rows: &[ResultRow]) -> Result<()> {
    let mut csv = csv::WriterBuilder::new()
        .terminator(csv::Terminator::CRLF)
        .from_writer(writer);

    csv.write_record(HEADER)
        .map_err(|e| AppError::Csv(e.to_string()))?;
    for row in rows {
        csv.write_record([row.name.as_str(), row.links.render().as_str()])
            .map_err(|e| AppError::Csv(e.to_string()))?;
    }
    csv.flush()?;
    Ok(())
}

pub fn write_csv(path: &Path, rows: &[ResultRow]) -> Result<()> {
    let file = File::create(path).map_err(|e| AppError::WriteFile {
        path: path.display().to_string(),
        source: e,
    })?;
    write_rows(BufWriter::new(file), rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    fn found(links: &[&str]) -> LinkCell {
        LinkCell::Found(links.iter().map(|l| l.to_string()).collect())
    }

    #[test]
    fn test_title_case_simple() {
        assert_eq!(title_case("alice"), "Alice");
        assert_eq!(title_case("alice liddell"), "Alice Liddell");
    }

    #[test]
    fn test_title_case_lowers_inner_capitals() {
        assert_eq!(title_case("ANNA smith"), "Anna Smith");
        assert_eq!(title_case("McDonald"), "Mcdonald");
    }

    #[test]
    fn test_title_case_after_punctuation_and_digits() {
        assert_eq!(title_case("mary-jane o'neil"), "Mary-Jane O'Neil");
        assert_eq!(title_case("user2name"), "User2Name");
    }

    #[test]
    fn test_title_case_unicode() {
        assert_eq!(title_case("élodie ångström"), "Élodie Ångström");
    }

    #[test]
    fn test_title_case_multi_char_expansions() {
        assert_eq!(title_case("ßarah"), "Ssarah");
        assert_eq!(title_case("ﬁona"), "Fiona");
    }

    #[test]
    fn test_title_case_digraphs() {
        assert_eq!(title_case("ǆemal"), "ǅemal");
        assert_eq!(title_case("ǇUBO"), "ǈubo");
        assert_eq!(title_case("ana ǉ"), "Ana ǈ");
    }

    #[test]
    fn test_title_case_sentinel_unchanged() {
        assert_eq!(title_case("Unknown User"), "Unknown User");
        assert_eq!(title_case(""), "");
    }

    #[test]
    fn test_render_joins_links() {
        let cell = found(&[
            "https://docs.google.com/spreadsheets/d/a",
            "https://docs.google.com/spreadsheets/d/b",
        ]);
        assert_eq!(
            cell.render(),
            "https://docs.google.com/spreadsheets/d/a, https://docs.google.com/spreadsheets/d/b"
        );
        assert!(cell.has_links());
    }

    #[test]
    fn test_render_failure_and_no_link_alike() {
        assert_eq!(LinkCell::NoLink.render(), "No link");
        assert_eq!(LinkCell::FetchFailed("timeout".to_string()).render(), "No link");
        assert_eq!(LinkCell::Found(Vec::new()).render(), "No link");
        assert!(!LinkCell::FetchFailed("timeout".to_string()).has_links());
    }

    #[test]
    fn test_sort_rows_is_stable_and_case_sensitive() {
        let mut rows = vec![
            ResultRow::new("bob", found(&["https://docs.google.com/spreadsheets/d/1"])),
            ResultRow::new("alice", LinkCell::NoLink),
            ResultRow::new("bob", found(&["https://docs.google.com/spreadsheets/d/2"])),
            ResultRow::new("Unknown User", LinkCell::NoLink),
        ];

        sort_rows(&mut rows);

        let names: Vec<_> = rows.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["Alice", "Bob", "Bob", "Unknown User"]);
        assert_eq!(rows[1].links.render(), "https://docs.google.com/spreadsheets/d/1");
        assert_eq!(rows[2].links.render(), "https://docs.google.com/spreadsheets/d/2");
    }

    #[test]
    fn test_write_rows_format() {
        let rows = vec![
            ResultRow::new("alice", found(&["https://docs.google.com/spreadsheets/d/abc123"])),
            ResultRow::new(
                "bob",
                found(&[
                    "https://docs.google.com/spreadsheets/d/x",
                    "https://docs.google.com/spreadsheets/d/y",
                ]),
            ),
            ResultRow::new("carol", LinkCell::NoLink),
        ];
        let mut out = Vec::new();

        write_rows(&mut out, &rows).unwrap();

        let text = String::from_utf8(out).unwrap();
        assert_eq!(
            text,
            "User Name,Google Sheets Links\r\n\
             Alice,https://docs.google.com/spreadsheets/d/abc123\r\n\
             Bob,\"https://docs.google.com/spreadsheets/d/x, https://docs.google.com/spreadsheets/d/y\"\r\n\
             Carol,No link\r\n"
        );
    }

    #[test]
    fn test_write_rows_empty_has_header_only() {
        let mut out = Vec::new();

        write_rows(&mut out, &[]).unwrap();

        assert_eq!(String::from_utf8(out).unwrap(), "User Name,Google Sheets Links\r\n");
    }

    #[test]
    fn test_write_csv_overwrites_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("extracted-links.csv");
        fs::write(&path, "stale contents that are longer than the new file\n").unwrap();

        write_csv(&path, &[ResultRow::new("dave", LinkCell::NoLink)]).unwrap();

        let text = fs::read_to_string(&path).unwrap();
        assert_eq!(text, "User Name,Google Sheets Links\r\nDave,No link\r\n");
    }

    #[test]
    fn test_write_csv_bad_path() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("missing").join("out.csv");

        let err = write_csv(&path, &[]).unwrap_err();

        assert!(matches!(err, AppError::WriteFile { .. }));
    }
}
