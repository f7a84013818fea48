// Discovery and reading of the TSE "votacao_candidato_munzona" extracts.

use std::path::{Path, PathBuf};

use glob::{glob_with, MatchOptions, Pattern};

use crate::extract::{io_common::read_with_fallback, *};

/// The glob pattern for the files of one year: any `*munzona*<UF>*.csv` file,
/// at any depth under `<root>/<year>`.
pub fn year_pattern(root: &Path, year: i32, uf: &str) -> String {
    let root_s = Pattern::escape(root.display().to_string().as_str());
    format!(
        "{}/{}/**/*munzona*{}*.csv",
        root_s.trim_end_matches('/'),
        year,
        Pattern::escape(uf)
    )
}

/// Finds the files of one year, sorted by path.
/// Finding none is an error.
pub fn discover_year_files(root: &Path, year: i32, uf: &str) -> ExtractResult<Vec<PathBuf>> {
    let pattern = year_pattern(root, year, uf);
    let options = MatchOptions {
        case_sensitive: true,
        require_literal_separator: true,
        require_literal_leading_dot: false,
    };
    let entries = glob_with(&pattern, options).context(InvalidGlobSnafu {
        pattern: pattern.clone(),
    })?;
    let mut files: Vec<PathBuf> = Vec::new();
    for entry in entries {
        match entry {
            Ok(p) if p.is_file() => files.push(p),
            Ok(_) => {}
            Err(e) => {
                warn!("discover_year_files: cannot access {:?}: {}", e.path(), e);
            }
        }
    }
    files.sort();
    ensure!(!files.is_empty(), NoFilesFoundSnafu { year, pattern });
    info!("Found {} file(s) for {}", files.len(), year);
    Ok(files)
}

/// Reads all the files of one year.
///
/// A file that cannot be read with either delimiter is skipped and reported
/// in the summary. If no file at all can be read, this is an error.
pub fn read_year_files(
    files: &[PathBuf],
    year: i32,
    summary: &mut YearSummary,
) -> ExtractResult<Vec<(PathBuf, RawTable)>> {
    let mut tables: Vec<(PathBuf, RawTable)> = Vec::new();
    for path in files.iter() {
        info!("Attempting to read TSE file {:?}", path);
        match read_with_fallback(path) {
            Ok(t) => {
                debug!(
                    "read_year_files: {:?}: {} columns, {} rows",
                    path,
                    t.headers.len(),
                    t.rows.len()
                );
                tables.push((path.clone(), t));
            }
            Err(e) => {
                warn!("Skipping unreadable file {:?}: {}", path, e);
                summary.skipped_files.push(SkippedFile {
                    path: path.display().to_string(),
                    reason: e.to_string(),
                });
            }
        }
    }
    summary.files_read = tables.len();
    ensure!(!tables.is_empty(), NoReadableFilesSnafu { year });
    Ok(tables)
}
