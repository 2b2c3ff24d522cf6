//! Ingest of uploaded files into a [`Table`].
//!
//! Two input families are supported:
//!
//! - delimited text (`.txt` reports exported from the ERP), with encoding
//!   and delimiter auto-detection, handled here
//! - spreadsheets (`.xlsx`, `.xls`, `.ods`), handled in [`workbook`]
//!
//! No business rules live here; cells are typed and aligned to the header row.

pub mod workbook;

pub use workbook::{parse_workbook_bytes, parse_workbook_file, parse_workbook_sheet};

use std::path::Path;

use crate::error::{IngestError, IngestResult};
use crate::models::{CellValue, Table};

/// Delimiter used when none can be detected.
pub const FALLBACK_DELIMITER: char = '\t';

/// Candidate delimiters in order of preference on ties.
const CANDIDATE_DELIMITERS: [char; 4] = [',', ';', '\t', '|'];

/// Number of non-blank lines inspected by [`detect_delimiter`].
const SNIFF_LINES: usize = 10;

/// Result of parsing delimited text, with the detected settings.
#[derive(Debug, Clone)]
pub struct ParseResult {
    /// Parsed table
    pub table: Table,
    /// Detected encoding
    pub encoding: String,
    /// Detected or fallback delimiter
    pub delimiter: char,
    /// Whether the delimiter came from detection rather than the fallback
    pub delimiter_detected: bool,
}

/// Detect the encoding of raw bytes using chardet
pub fn detect_encoding(bytes: &[u8]) -> String {
    let result = chardet::detect(bytes);
    let charset = result.0;

    // Normalize charset names
    match charset.to_lowercase().as_str() {
        "" | "ascii" | "utf-8" | "utf8" => "utf-8".to_string(),
        "iso-8859-1" | "iso-8859-15" | "latin-1" | "latin1" => "iso-8859-1".to_string(),
        "windows-1252" | "cp1252" => "windows-1252".to_string(),
        _ => charset,
    }
}

/// Decode bytes to a string using the given encoding.
///
/// Unknown encodings and invalid sequences decode lossily as UTF-8.
/// A leading byte order mark is stripped.
pub fn decode_content(bytes: &[u8], encoding: &str) -> String {
    let codec = match encoding.to_lowercase().as_str() {
        "iso-8859-1" | "latin-1" | "latin1" => encoding_rs::ISO_8859_15,
        "windows-1252" | "cp1252" => encoding_rs::WINDOWS_1252,
        _ => encoding_rs::UTF_8,
    };
    codec.decode(bytes).0.into_owned()
}

/// Detect the field delimiter from the first lines of the content.
///
/// Each candidate splits the sampled lines with the csv reader, so
/// delimiters inside quoted fields are not counted. A candidate qualifies
/// when every sampled record has the same number of fields, and more than
/// one. The widest qualifying candidate wins. Returns `None` when nothing
/// qualifies.
pub fn detect_delimiter(content: &str) -> Option<char> {
    let sample = content
        .lines()
        .filter(|l| !l.trim().is_empty())
        .take(SNIFF_LINES)
        .collect::<Vec<_>>()
        .join("\n");

    if sample.is_empty() {
        return None;
    }

    let mut best: Option<(char, usize)> = None;
    for &sep in &CANDIDATE_DELIMITERS {
        let Some(width) = consistent_width(&sample, sep) else {
            continue;
        };
        if width < 2 {
            continue;
        }
        match best {
            Some((_, best_width)) if best_width >= width => {}
            _ => best = Some((sep, width)),
        }
    }

    best.map(|(sep, _)| sep)
}

/// Field count shared by every record of the sample, if they all agree.
fn consistent_width(sample: &str, delimiter: char) -> Option<usize> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter as u8)
        .has_headers(false)
        .flexible(true)
        .from_reader(sample.as_bytes());

    let mut width = None;
    for record in reader.records() {
        let len = record.ok()?.len();
        match width {
            None => width = Some(len),
            Some(w) if w != len => return None,
            Some(_) => {}
        }
    }
    width
}

/// Make header names unique and non-blank.
///
/// Blank headers become `Unnamed: <index>`; repeated names get a `.1`, `.2`
/// suffix in order of appearance.
pub fn unique_headers<I, S>(raw: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut headers: Vec<String> = Vec::new();
    for (i, name) in raw.into_iter().enumerate() {
        let name = name.as_ref().trim();
        let base = if name.is_empty() {
            format!("Unnamed: {}", i)
        } else {
            name.to_string()
        };

        let mut candidate = base.clone();
        let mut n = 1;
        while headers.contains(&candidate) {
            candidate = format!("{}.{}", base, n);
            n += 1;
        }
        headers.push(candidate);
    }
    headers
}

/// Parse delimited text with an explicit delimiter.
///
/// The first record is the header row. Blank records are skipped and
/// ragged records are padded or truncated to the header width.
///
/// # Example
/// ```ignore
/// use autodetracciones::parser::parse_delimited;
///
/// let table = parse_delimited("a\tb\n1\t2", '\t').unwrap();
/// assert_eq!(table.columns, vec!["a", "b"]);
/// assert_eq!(table.len(), 1);
/// ```
pub fn parse_delimited(content: &str, delimiter: char) -> IngestResult<Table> {
    if content.trim().is_empty() {
        return Err(IngestError::EmptyFile);
    }

    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter as u8)
        .has_headers(false)
        .flexible(true)
        .from_reader(content.as_bytes());

    let mut records = reader.records();

    let header = records.next().ok_or(IngestError::EmptyFile)??;
    if header.iter().all(|h| h.trim().is_empty()) {
        return Err(IngestError::NoHeaders);
    }

    let mut table = Table::new(unique_headers(header.iter()));

    for record in records {
        let record = record?;
        if record.iter().all(|f| f.trim().is_empty()) {
            continue;
        }
        table.push_row(record.iter().map(CellValue::infer).collect());
    }

    Ok(table)
}

/// Parse delimited text bytes with auto-detection of encoding and delimiter.
///
/// Falls back to [`FALLBACK_DELIMITER`] when detection fails.
pub fn parse_text_bytes(bytes: &[u8]) -> IngestResult<ParseResult> {
    if bytes.is_empty() {
        return Err(IngestError::EmptyFile);
    }

    let encoding = detect_encoding(bytes);
    let content = decode_content(bytes, &encoding);

    let detected = detect_delimiter(&content);
    let delimiter = detected.unwrap_or(FALLBACK_DELIMITER);

    let table = parse_delimited(&content, delimiter)?;

    Ok(ParseResult {
        table,
        encoding,
        delimiter,
        delimiter_detected: detected.is_some(),
    })
}

/// Parse a delimited text file with auto-detection.
pub fn parse_text_file<P: AsRef<Path>>(path: P) -> IngestResult<ParseResult> {
    let bytes = std::fs::read(path.as_ref())?;
    parse_text_bytes(&bytes)
}

/// Whether a file name designates a delimited text upload.
pub fn is_text_upload(file_name: &str) -> bool {
    file_name.ends_with(".txt")
}

/// Parse any supported file, choosing the reader by extension.
///
/// `.txt`, `.csv` and `.tsv` go through the text reader; everything else
/// is opened as a spreadsheet.
pub fn parse_file_auto<P: AsRef<Path>>(path: P) -> IngestResult<Table> {
    let path = path.as_ref();
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or_default()
        .to_ascii_lowercase();

    match ext.as_str() {
        "txt" | "csv" | "tsv" => Ok(parse_text_file(path)?.table),
        _ => parse_workbook_file(path),
    }
}

/// Format delimiter for display
pub fn format_delimiter(d: char) -> String {
    match d {
        '\t' => "TAB".to_string(),
        c => c.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tab_separated() {
        let table = parse_delimited("a\tb\n1\t2", '\t').unwrap();

        assert_eq!(table.columns, vec!["a", "b"]);
        assert_eq!(table.rows, vec![vec![CellValue::Int(1), CellValue::Int(2)]]);
    }

    #[test]
    fn test_quoted_values() {
        let table = parse_delimited("name;value\n\"Alice\";\"Hello; World\"", ';').unwrap();

        assert_eq!(table.rows[0][0], CellValue::from("Alice"));
        assert_eq!(table.rows[0][1], CellValue::from("Hello; World"));
    }

    #[test]
    fn test_empty_lines_skipped() {
        let table = parse_delimited("a;b\n1;2\n\n3;4\n", ';').unwrap();
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn test_ragged_rows() {
        let table = parse_delimited("a;b;c\n1;;3\n4\n5;6;7;8", ';').unwrap();

        assert_eq!(table.rows[0][1], CellValue::Empty);
        assert_eq!(table.rows[1], vec![CellValue::Int(4), CellValue::Empty, CellValue::Empty]);
        assert_eq!(table.rows[2].len(), 3);
    }

    #[test]
    fn test_empty_content_error() {
        assert!(matches!(parse_delimited("", ';'), Err(IngestError::EmptyFile)));
        assert!(matches!(parse_text_bytes(b""), Err(IngestError::EmptyFile)));
    }

    #[test]
    fn test_blank_header_error() {
        assert!(matches!(parse_delimited("\t\t\n1\t2\t3", '\t'), Err(IngestError::NoHeaders)));
    }

    #[test]
    fn test_detect_delimiter() {
        assert_eq!(detect_delimiter("a;b;c\n1;2;3"), Some(';'));
        assert_eq!(detect_delimiter("a,b,c\n1,2,3"), Some(','));
        assert_eq!(detect_delimiter("a\tb\tc\n1\t2\t3"), Some('\t'));
        assert_eq!(detect_delimiter("a|b|c\n1|2|3"), Some('|'));
    }

    #[test]
    fn test_detect_delimiter_requires_consistency() {
        // Commas inside the tab-separated values must not win
        let content = "name\tamount\nDoe, John\t1,5\nRoe\t2";
        assert_eq!(detect_delimiter(content), Some('\t'));
    }

    #[test]
    fn test_detect_delimiter_ignores_quoted_separators() {
        assert_eq!(detect_delimiter("a,b\n\"x,y\",2\n"), Some(','));
        assert_eq!(detect_delimiter("a;b\n\"1;2;3\";4\n5;6"), Some(';'));
    }

    #[test]
    fn test_quoted_comma_field_keeps_columns() {
        let result = parse_text_bytes(b"a,b\n\"x,y\",2\n").unwrap();

        assert_eq!(result.delimiter, ',');
        assert!(result.delimiter_detected);
        assert_eq!(result.table.columns, vec!["a", "b"]);
        assert_eq!(result.table.rows, vec![vec![CellValue::from("x,y"), CellValue::Int(2)]]);
    }

    #[test]
    fn test_detect_delimiter_none() {
        assert_eq!(detect_delimiter("single\nvalue"), None);
        assert_eq!(detect_delimiter(""), None);
    }

    #[test]
    fn test_text_bytes_fallback_to_tab() {
        let result = parse_text_bytes(b"header\nvalue").unwrap();

        assert_eq!(result.delimiter, '\t');
        assert!(!result.delimiter_detected);
        assert_eq!(result.table.columns, vec!["header"]);
        assert_eq!(result.table.rows[0][0], CellValue::from("value"));
    }

    #[test]
    fn test_auto_parse() {
        let result = parse_text_bytes("name;age\nAlice;30\nBob;25".as_bytes()).unwrap();

        assert_eq!(result.delimiter, ';');
        assert!(result.delimiter_detected);
        assert_eq!(result.table.len(), 2);
        assert_eq!(result.table.columns, vec!["name", "age"]);
    }

    #[test]
    fn test_latin1_decoding() {
        // "Société" in ISO-8859-1
        let bytes: &[u8] = &[0x53, 0x6F, 0x63, 0x69, 0xE9, 0x74, 0xE9];
        let decoded = decode_content(bytes, "iso-8859-1");
        assert_eq!(decoded, "Société");
    }

    #[test]
    fn test_utf8_bom_stripped() {
        let decoded = decode_content(b"\xEF\xBB\xBFa\tb", "utf-8");
        assert_eq!(decoded, "a\tb");
    }

    #[test]
    fn test_unique_headers() {
        let headers = unique_headers(["a", "", "a", " b ", "a"]);
        assert_eq!(headers, vec!["a", "Unnamed: 1", "a.1", "b", "a.2"]);
    }

    #[test]
    fn test_is_text_upload() {
        assert!(is_text_upload("report.txt"));
        assert!(!is_text_upload("data.csv"));
        assert!(!is_text_upload("report.TXT"));
    }
}
