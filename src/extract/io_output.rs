// Writing of the CSV outputs.

use std::path::Path;

use csv::Writer;
use tse_votes::{VoteRecord, VOTE_RECORD_COLUMNS};

use crate::extract::*;

fn open_writer(dest: &Path) -> ExtractResult<Writer<fs::File>> {
    let p = dest.display().to_string();
    if let Some(parent) = dest.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).context(CreatingDirSnafu {
                path: parent.display().to_string(),
            })?;
        }
    }
    csv::WriterBuilder::new()
        .has_headers(false)
        .from_path(dest)
        .context(WritingCsvSnafu { path: p })
}

/// Writes the canonical records, header first. The file is overwritten.
pub fn write_records(dest: &Path, records: &[VoteRecord]) -> ExtractResult<()> {
    let p = dest.display().to_string();
    let mut wtr = open_writer(dest)?;
    wtr.write_record(VOTE_RECORD_COLUMNS)
        .context(WritingCsvSnafu { path: p.clone() })?;
    for r in records.iter() {
        wtr.serialize(r).context(WritingCsvSnafu { path: p.clone() })?;
    }
    wtr.flush().context(FlushingCsvSnafu { path: p })?;
    Ok(())
}

/// Writes a table of strings, header first. The file is overwritten.
pub fn write_table(dest: &Path, header: &[String], rows: &[Vec<String>]) -> ExtractResult<()> {
    let p = dest.display().to_string();
    let mut wtr = open_writer(dest)?;
    wtr.write_record(header)
        .context(WritingCsvSnafu { path: p.clone() })?;
    for row in rows.iter() {
        wtr.write_record(row)
            .context(WritingCsvSnafu { path: p.clone() })?;
    }
    wtr.flush().context(FlushingCsvSnafu { path: p })?;
    Ok(())
}
