// Primitives shared by the readers.

use std::path::Path;

use encoding_rs::WINDOWS_1252;
use tse_votes::RawTable;

use crate::extract::*;

/// Decodes the content of a file.
///
/// The TSE distributes its files in Latin-1, but some mirrors re-encode them in
/// UTF-8. Valid UTF-8 is kept as it is, anything else is read as Windows-1252
/// (the superset of Latin-1 used by browsers).
pub fn decode_text(bytes: &[u8]) -> String {
    let bytes = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes);
    match std::str::from_utf8(bytes) {
        Ok(s) => s.to_string(),
        Err(_) => {
            let (s, _, had_errors) = WINDOWS_1252.decode(bytes);
            if had_errors {
                warn!("decode_text: some characters could not be decoded");
            }
            s.into_owned()
        }
    }
}

/// Parses the text with the given delimiter.
///
/// Rows of different lengths are an error, and so is a header with a single
/// column: this is what a file split with the wrong delimiter looks like.
pub fn parse_delimited(text: &str, delimiter: u8, path: &str) -> ExtractResult<RawTable> {
    let mut rdr = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(true)
        .flexible(false)
        .from_reader(text.as_bytes());
    let delim = delimiter as char;
    let headers: Vec<String> = rdr
        .headers()
        .context(CsvParseSnafu {
            path,
            delimiter: delim,
        })?
        .iter()
        .map(|s| s.trim().to_string())
        .collect();
    ensure!(
        headers.len() > 1,
        SingleColumnSnafu {
            path,
            delimiter: delim
        }
    );
    let mut rows: Vec<Vec<String>> = Vec::new();
    for line_r in rdr.records() {
        let line = line_r.context(CsvParseSnafu {
            path,
            delimiter: delim,
        })?;
        rows.push(line.iter().map(|s| s.to_string()).collect());
    }
    Ok(RawTable::new(headers, rows))
}

/// Reads a delimited file, trying the semicolon first and then the comma.
pub fn read_with_fallback(path: &Path) -> ExtractResult<RawTable> {
    let p = path.display().to_string();
    let bytes = fs::read(path).context(OpeningFileSnafu { path: p.clone() })?;
    let text = decode_text(&bytes);
    match parse_delimited(&text, b';', &p) {
        Ok(t) => Ok(t),
        Err(e) => {
            debug!("read_with_fallback: {}: {}, trying with ','", p, e);
            parse_delimited(&text, b',', &p)
        }
    }
}

/// Key used to compare municipality names: uppercase, single spaces.
pub fn name_key(name: &str) -> String {
    name.split_whitespace()
        .collect::<Vec<&str>>()
        .join(" ")
        .to_uppercase()
}
