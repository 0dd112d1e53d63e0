//! Minimal, tolerant extraction of the catalog page's HTML table.
//!
//! The archive page is machine-generated and stable, so this deliberately
//! scans for tag blocks instead of building a full DOM: case-insensitive tag
//! detection, local scanning within the `<table>` block, tag stripping and
//! entity/whitespace normalization on cell text.

use std::sync::OnceLock;

use regex::Regex;

use crate::error::DiggerError;

#[derive(Debug, Clone)]
pub struct HtmlTable {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

fn table_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?is)<table\b.*?>(.*?)</table>").unwrap())
}

fn row_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?is)<tr\b.*?>(.*?)</tr>").unwrap())
}

fn cell_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?is)<(th|td)\b.*?>(.*?)</(?:th|td)>").unwrap())
}

fn tag_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?s)<[^>]*>").unwrap())
}

/// Extracts the first `<table>` on the page as header + data rows.
///
/// The header row is whichever row comes first; rows with a differing cell
/// count are rejected loudly rather than silently truncated.
pub fn extract_first_table(page: &str) -> Result<HtmlTable, DiggerError> {
    let table = table_re()
        .captures(page)
        .ok_or_else(|| DiggerError::HtmlParse("no <table> element found".to_string()))?;
    let body = table.get(1).map(|m| m.as_str()).unwrap_or_default();

    let mut headers: Vec<String> = Vec::new();
    let mut rows: Vec<Vec<String>> = Vec::new();

    for row in row_re().captures_iter(body) {
        let row_body = row.get(1).map(|m| m.as_str()).unwrap_or_default();
        let cells: Vec<String> = cell_re()
            .captures_iter(row_body)
            .map(|cell| normalize_text(cell.get(2).map(|m| m.as_str()).unwrap_or_default()))
            .collect();
        if cells.is_empty() {
            continue;
        }
        if headers.is_empty() {
            headers = cells;
            continue;
        }
        if cells.len() != headers.len() {
            return Err(DiggerError::HtmlParse(format!(
                "row with {} cells under a {}-column header",
                cells.len(),
                headers.len()
            )));
        }
        rows.push(cells);
    }

    if headers.is_empty() {
        return Err(DiggerError::HtmlParse("table has no rows".to_string()));
    }
    Ok(HtmlTable { headers, rows })
}

/// Strips nested tags, decodes the handful of entities the page uses, and
/// collapses runs of whitespace to single spaces.
fn normalize_text(raw: &str) -> String {
    let stripped = tag_re().replace_all(raw, " ");
    let decoded = stripped
        .replace("&nbsp;", " ")
        .replace("&amp;", "&")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&#39;", "'")
        .replace("&quot;", "\"");
    decoded.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    const PAGE: &str = r#"
        <html><body><h1>HARPS RVBank</h1>
        <TABLE border="1">
          <tr><th>Target</th><th>RA</th><th>DEC</th><th>Pre-upgrade DRS</th></tr>
          <tr><td><b>HD10700</b></td><td>01 44 04.08</td><td>-15 56 14.9</td>
              <td><a href="HD10700_RVs/HD10700_harps.vels">HD10700_harps.vels</a></td></tr>
          <tr><td>HD20794</td><td>03 19 55.65</td><td>-43 04 11.2</td><td>nan</td></tr>
        </TABLE>
        <table><tr><td>second table, ignored</td></tr></table>
        </body></html>"#;

    #[test]
    fn extracts_first_table_only() {
        let table = extract_first_table(PAGE).unwrap();
        assert_eq!(
            table.headers,
            vec!["Target", "RA", "DEC", "Pre-upgrade DRS"]
        );
        assert_eq!(table.rows.len(), 2);
        assert_eq!(table.rows[0][0], "HD10700");
        assert_eq!(table.rows[0][3], "HD10700_harps.vels");
        assert_eq!(table.rows[1][3], "nan");
    }

    #[test]
    fn no_table_is_loud() {
        let err = extract_first_table("<html><p>nothing here</p></html>").unwrap_err();
        assert_matches!(err, DiggerError::HtmlParse(_));
    }

    #[test]
    fn ragged_row_is_loud() {
        let ragged = r#"<table>
            <tr><th>A</th><th>B</th></tr>
            <tr><td>1</td></tr>
        </table>"#;
        let err = extract_first_table(ragged).unwrap_err();
        assert_matches!(err, DiggerError::HtmlParse(_));
    }

    #[test]
    fn normalizes_entities_and_whitespace() {
        assert_eq!(normalize_text("  a &amp; b\n\t c  "), "a & b c");
        assert_eq!(normalize_text("<i>HD </i>10700"), "HD 10700");
    }
}
