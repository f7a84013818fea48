use log::{debug, info, warn};

use snafu::{prelude::*, Snafu};

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::json;
use serde_json::Value as JSValue;

use tse_votes::*;

use crate::extract::{
    io_bigquery::{build_query_request, canonical_rows, run_query, BigQueryApi},
    io_ibge::read_ibge_map,
    io_output::{write_records, write_table},
    io_tse::{discover_year_files, read_year_files},
};

pub mod config_reader;
pub mod io_bigquery;
pub mod io_common;
pub mod io_ibge;
pub mod io_output;
pub mod io_tse;

#[derive(Debug, Snafu)]
pub enum ExtractError {
    #[snafu(display("Error opening file {path}"))]
    OpeningFile {
        source: std::io::Error,
        path: String,
    },
    #[snafu(display("Error parsing JSON"))]
    ParsingJson { source: serde_json::Error },

    #[snafu(display("Invalid file pattern {pattern}"))]
    InvalidGlob {
        source: glob::PatternError,
        pattern: String,
    },
    #[snafu(display("No CSV file found for {year} in {pattern}"))]
    NoFilesFound { year: i32, pattern: String },
    #[snafu(display("Could not read any CSV file for {year}"))]
    NoReadableFiles { year: i32 },
    #[snafu(display("Could not parse {path} with the delimiter {delimiter:?}"))]
    CsvParse {
        source: csv::Error,
        path: String,
        delimiter: char,
    },
    #[snafu(display("{path} has a single column with the delimiter {delimiter:?}"))]
    SingleColumn { path: String, delimiter: char },
    #[snafu(display("Could not harmonize the columns of {path}"))]
    Harmonize {
        source: HarmonizeError,
        path: String,
    },

    #[snafu(display("Error creating directory {path}"))]
    CreatingDir {
        source: std::io::Error,
        path: String,
    },
    #[snafu(display("Error writing {path}"))]
    WritingCsv { source: csv::Error, path: String },
    #[snafu(display("Error flushing {path}"))]
    FlushingCsv {
        source: std::io::Error,
        path: String,
    },

    #[snafu(display("BigQuery request failed"))]
    Http { source: reqwest::Error },
    #[snafu(display("BigQuery returned status {status}: {body}"))]
    BigQueryStatus { status: u16, body: String },
    #[snafu(display("BigQuery response without job reference"))]
    MissingJobReference {},
    #[snafu(display("Missing column {column} in {path}"))]
    MissingColumn { column: String, path: String },
    #[snafu(display(
        "No access token: use --token, set GOOGLE_OAUTH_ACCESS_TOKEN or log in with gcloud"
    ))]
    MissingToken {},

    #[snafu(whatever, display("{message}"))]
    Whatever {
        message: String,
        #[snafu(source(from(Box<dyn std::error::Error>, Some)))]
        source: Option<Box<dyn std::error::Error>>,
    },
}

pub type ExtractResult<T> = Result<T, ExtractError>;

/// A file found during the discovery but that could not be parsed.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct SkippedFile {
    pub path: String,
    pub reason: String,
}

/// What happened to one year of the local extraction.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct YearSummary {
    pub year: i32,
    pub files_found: usize,
    pub files_read: usize,
    pub skipped_files: Vec<SkippedFile>,
    pub raw_rows: usize,
    pub matched_rows: usize,
    pub aggregated_rows: usize,
    pub votes: u64,
}

impl YearSummary {
    pub fn new(year: i32) -> YearSummary {
        YearSummary {
            year,
            files_found: 0,
            files_read: 0,
            skipped_files: Vec::new(),
            raw_rows: 0,
            matched_rows: 0,
            aggregated_rows: 0,
            votes: 0,
        }
    }
}

#[derive(Eq, PartialEq, Debug, Clone, Default)]
pub struct LocalSummary {
    pub rows_written: usize,
    pub years: Vec<YearSummary>,
    /// Municipalities without IBGE code, when a map was given.
    pub unresolved_municipios: Vec<String>,
}

impl LocalSummary {
    pub fn skipped_files(&self) -> Vec<&SkippedFile> {
        self.years.iter().flat_map(|y| y.skipped_files.iter()).collect()
    }
}

#[derive(Eq, PartialEq, Debug, Clone, Default)]
pub struct RemoteSummary {
    pub rows_written: usize,
    pub null_cells: usize,
}

fn warn_missing_columns(table: &RawTable, path: &Path) {
    for scheme in COLUMN_SCHEMES.iter() {
        let missing: Vec<&str> = scheme
            .source_columns()
            .into_iter()
            .filter(|c| table.column_index(c).is_none())
            .collect();
        warn!(
            "{:?}: scheme {} is missing the columns {:?}",
            path, scheme.name, missing
        );
    }
}

fn process_year(
    root: &Path,
    year: i32,
    target: &Target,
) -> ExtractResult<(Vec<VoteRecord>, YearSummary)> {
    let mut ys = YearSummary::new(year);
    let files = discover_year_files(root, year, &target.uf)?;
    ys.files_found = files.len();
    let tables = read_year_files(&files, year, &mut ys)?;

    let mut aggregator = Aggregator::new();
    for (path, table) in tables.iter() {
        if find_scheme(COLUMN_SCHEMES, table).is_none() {
            warn_missing_columns(table, path);
        }
        let records = harmonize(table, year).context(HarmonizeSnafu {
            path: path.display().to_string(),
        })?;
        ys.raw_rows += records.len();
        for r in records {
            if matches_target(&r, target) {
                ys.matched_rows += 1;
                ys.votes += r.votos;
                aggregator.add_record(r);
            }
        }
    }
    ys.aggregated_rows = aggregator.len();
    info!(
        "Year {}: {} raw rows, {} matching rows, {} aggregated rows, {} votes",
        year, ys.raw_rows, ys.matched_rows, ys.aggregated_rows, ys.votes
    );
    Ok((aggregator.finish(), ys))
}

/// Runs the extraction from the TSE files found under `root`.
///
/// The years are processed in order and the output is only written once all of
/// them succeeded: a failure leaves `dest` untouched.
pub fn run_local_extraction(
    root: &Path,
    dest: &Path,
    target: &Target,
    ibge_map_path: Option<&Path>,
) -> ExtractResult<LocalSummary> {
    info!("Local extraction from {:?}, target: {:?}", root, target);
    let ibge_map = match ibge_map_path {
        Some(p) => Some(read_ibge_map(p, &target.uf)?),
        None => None,
    };

    let mut summary = LocalSummary::default();
    let mut records: Vec<VoteRecord> = Vec::new();
    for year in target.years.iter() {
        let (mut year_records, ys) = process_year(root, *year, target)?;
        records.append(&mut year_records);
        summary.years.push(ys);
    }

    if let Some(map) = ibge_map {
        summary.unresolved_municipios = map.apply(&mut records);
        if !summary.unresolved_municipios.is_empty() {
            warn!(
                "No IBGE code for {} municipalities",
                summary.unresolved_municipios.len()
            );
        }
    }

    write_records(dest, &records)?;
    summary.rows_written = records.len();
    Ok(summary)
}

/// Runs the extraction from the warehouse.
pub fn run_remote_extraction<A: BigQueryApi>(
    api: &A,
    dest: &Path,
    target: &Target,
) -> ExtractResult<RemoteSummary> {
    info!("Remote extraction, target: {:?}", target);
    let request = build_query_request(target);
    let table = run_query(api, &request)?;
    let null_cells = table
        .rows
        .iter()
        .map(|r| r.iter().filter(|c| c.is_none()).count())
        .sum();
    debug!("run_remote_extraction: {} missing values", null_cells);
    let (columns, rows) = canonical_rows(&table)?;
    write_table(dest, &columns, &rows)?;
    Ok(RemoteSummary {
        rows_written: rows.len(),
        null_cells,
    })
}

pub fn print_local_summary(summary: &LocalSummary, dest: &str) {
    for ys in summary.years.iter() {
        println!(
            "{}: {} file(s) read out of {}, {} matching rows, {} votes",
            ys.year, ys.files_read, ys.files_found, ys.matched_rows, ys.votes
        );
    }
    for sf in summary.skipped_files() {
        println!("warning: skipped {}: {}", sf.path, sf.reason);
    }
    if !summary.unresolved_municipios.is_empty() {
        println!(
            "warning: no IBGE code for {}",
            summary.unresolved_municipios.join(", ")
        );
    }
    println!("✓ {} rows written to {}", summary.rows_written, dest);
}

fn remote_summary_lines(summary: &RemoteSummary, dest: &str) -> Vec<String> {
    let mut lines: Vec<String> = Vec::new();
    if summary.null_cells > 0 {
        lines.push(format!(
            "{} missing value(s) written as empty cells",
            summary.null_cells
        ));
    }
    lines.push(format!("✓ {} rows written to {}", summary.rows_written, dest));
    lines
}

pub fn print_remote_summary(summary: &RemoteSummary, dest: &str) {
    for l in remote_summary_lines(summary, dest) {
        println!("{}", l);
    }
}

/// Prints the error and its causes on the standard error.
pub fn report_error(e: &ExtractError) {
    eprintln!("An error occured: {}", e);
    let mut source = std::error::Error::source(e);
    while let Some(s) = source {
        eprintln!("  caused by: {}", s);
        source = s.source();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::io_bigquery::tests::{row_js, FakeApi, SCHEMA};
    use std::path::PathBuf;

    const HEADER_2010: &str = "\"DT_GERACAO\";\"ANO_ELEICAO\";\"NUM_TURNO\";\"SG_UF\";\"NM_MUNICIPIO\";\"DS_CARGO\";\"NR_CANDIDATO\";\"NM_CANDIDATO\";\"SG_PARTIDO\";\"NM_PARTIDO\";\"QT_VOTOS_NOMINAIS\"";
    const HEADER_OLD: &str = "\"DT_GERACAO\";\"ANO_ELEICAO\";\"NUM_TURNO\";\"SG_UF\";\"NM_MUNICIPIO\";\"DS_CARGO\";\"NR_VOTAVEL\";\"NM_VOTAVEL\";\"SG_PARTIDO\";\"NM_PARTIDO\";\"QT_VOTOS_NOMINAIS\"";

    fn init() {
        let _ = env_logger::builder().is_test(true).try_init();
    }

    fn line(year: i32, municipio: &str, nome: &str, votos: &str) -> String {
        format!(
            "\"01/01/{}\";\"{}\";\"1\";\"PR\";\"{}\";\"DEPUTADO ESTADUAL\";\"20123\";\"{}\";\"PSC\";\"PARTIDO SOCIAL CRISTAO\";\"{}\"",
            year + 1,
            year,
            municipio,
            nome,
            votos
        )
    }

    fn write_year(root: &Path, year: i32, lines: &[String]) -> PathBuf {
        let header = if year < 2010 { HEADER_OLD } else { HEADER_2010 };
        let p = root
            .join(year.to_string())
            .join(format!("votacao_candidato_munzona_{}_PR.csv", year));
        fs::create_dir_all(p.parent().unwrap()).unwrap();
        let mut content = header.to_string();
        for l in lines.iter() {
            content.push('\n');
            content.push_str(l);
        }
        content.push('\n');
        fs::write(&p, content).unwrap();
        p
    }

    fn read_output(dest: &Path) -> Vec<csv::StringRecord> {
        let mut rdr = csv::Reader::from_path(dest).unwrap();
        rdr.records().map(|r| r.unwrap()).collect()
    }

    #[test]
    fn one_row_per_year() {
        init();
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("tse");
        for year in Target::DEFAULT_YEARS.iter() {
            write_year(&root, *year, &[line(*year, "CASCAVEL", "LEONALDO PARANHOS", "100")]);
        }
        let dest = dir.path().join("templates/eleicoes_paranhos.csv");
        let summary = run_local_extraction(&root, &dest, &Target::default(), None).unwrap();
        assert_eq!(summary.rows_written, 4);
        assert!(summary.skipped_files().is_empty());

        let rows = read_output(&dest);
        assert_eq!(rows.len(), 4);
        for (row, year) in rows.iter().zip(Target::DEFAULT_YEARS.iter()) {
            assert_eq!(&row[0], year.to_string().as_str());
            assert_eq!(&row[2], "DEPUTADO ESTADUAL");
            assert_eq!(&row[4], "");
            assert_eq!(&row[5], "CASCAVEL");
            assert_eq!(&row[10], "100");
        }
    }

    #[test]
    fn duplicates_are_summed_and_votes_conserved() {
        init();
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("tse");
        for year in Target::DEFAULT_YEARS.iter() {
            write_year(
                &root,
                *year,
                &[
                    line(*year, "CASCAVEL", "LEONALDO PARANHOS", "100"),
                    line(*year, "CASCAVEL", "LEONALDO PARANHOS", "23"),
                    line(*year, "TOLEDO", "Paranhos Leonaldo", "7"),
                    line(*year, "TOLEDO", "OUTRO CANDIDATO", "1000"),
                    line(*year, "TOLEDO", "LEONALDO PARANHOS", "abc"),
                ],
            );
        }
        let dest = dir.path().join("out.csv");
        let summary = run_local_extraction(&root, &dest, &Target::default(), None).unwrap();
        assert_eq!(summary.rows_written, 12);
        for ys in summary.years.iter() {
            assert_eq!(ys.raw_rows, 5);
            assert_eq!(ys.matched_rows, 4);
            assert_eq!(ys.votes, 130);
        }

        let rows = read_output(&dest);
        for year in Target::DEFAULT_YEARS.iter() {
            let y = year.to_string();
            let year_rows: Vec<&csv::StringRecord> =
                rows.iter().filter(|r| &r[0] == y.as_str()).collect();
            let total: u64 = year_rows.iter().map(|r| r[10].parse::<u64>().unwrap()).sum();
            assert_eq!(total, 130);
            let cascavel: Vec<&&csv::StringRecord> =
                year_rows.iter().filter(|r| &r[5] == "CASCAVEL").collect();
            assert_eq!(cascavel.len(), 1);
            assert_eq!(&cascavel[0][10], "123");
        }
    }

    #[test]
    fn malformed_ballot_number_keeps_keys_unique() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("tse");
        for year in Target::DEFAULT_YEARS.iter() {
            let nulo = line(*year, "CASCAVEL", "LEONALDO PARANHOS", "5")
                .replace("\"20123\"", "\"#NULO\"");
            write_year(
                &root,
                *year,
                &[nulo, line(*year, "CASCAVEL", "LEONALDO PARANHOS", "10")],
            );
        }
        let dest = dir.path().join("out.csv");
        let summary = run_local_extraction(&root, &dest, &Target::default(), None).unwrap();
        assert_eq!(summary.rows_written, 4);

        let rows = read_output(&dest);
        assert_eq!(rows.len(), 4);
        for row in rows.iter() {
            assert_eq!(&row[7], "20123");
            assert_eq!(&row[10], "15");
        }
    }

    #[test]
    fn missing_year_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("tse");
        for year in [2006, 2010, 2014] {
            write_year(&root, year, &[line(year, "CASCAVEL", "LEONALDO PARANHOS", "100")]);
        }
        let dest = dir.path().join("out.csv");
        let res = run_local_extraction(&root, &dest, &Target::default(), None);
        assert!(matches!(res, Err(ExtractError::NoFilesFound { year: 2002, .. })));
        assert!(!dest.exists());
    }

    #[test]
    fn unknown_columns_abort() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("tse");
        for year in Target::DEFAULT_YEARS.iter() {
            write_year(&root, *year, &[line(*year, "CASCAVEL", "LEONALDO PARANHOS", "100")]);
        }
        let bad = root.join("2010/extra/votacao_candidato_munzona_2010_PR_BR.csv");
        fs::create_dir_all(bad.parent().unwrap()).unwrap();
        fs::write(&bad, "ANO;CANDIDATO;VOTOS\n2010;LEONALDO PARANHOS;5\n").unwrap();
        let dest = dir.path().join("out.csv");
        let res = run_local_extraction(&root, &dest, &Target::default(), None);
        match res {
            Err(ExtractError::Harmonize { path, source }) => {
                assert_eq!(path, bad.display().to_string());
                assert!(matches!(source, HarmonizeError::UnknownColumns { year: 2010, .. }));
            }
            x => panic!("unexpected result {:?}", x),
        }
        assert!(!dest.exists());
    }

    #[test]
    fn unreadable_file_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("tse");
        for year in Target::DEFAULT_YEARS.iter() {
            write_year(&root, *year, &[line(*year, "CASCAVEL", "LEONALDO PARANHOS", "100")]);
        }
        let broken = root.join("2014/votacao_candidato_munzona_2014_PR_old.csv");
        fs::write(&broken, "garbage\nmore garbage\n").unwrap();
        let dest = dir.path().join("out.csv");
        let summary = run_local_extraction(&root, &dest, &Target::default(), None).unwrap();
        assert_eq!(summary.rows_written, 4);
        let skipped = summary.skipped_files();
        assert_eq!(skipped.len(), 1);
        assert_eq!(skipped[0].path, broken.display().to_string());
    }

    #[test]
    fn latin1_files_and_ibge_codes() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("tse");
        for year in Target::DEFAULT_YEARS.iter() {
            let p = write_year(&root, *year, &[]);
            let mut bytes = fs::read(&p).unwrap();
            let prefix = format!("\"x\";\"{}\";\"1\";\"PR\";\"", year);
            bytes.extend_from_slice(prefix.as_bytes());
            // "SÃO JOSÉ DOS PINHAIS" in Latin-1
            bytes.extend_from_slice(b"S\xC3O JOS\xC9 DOS PINHAIS");
            bytes.extend_from_slice(
                b"\";\"DEPUTADO ESTADUAL\";\"20123\";\"LEONALDO PARANHOS\";\"PSC\";\"PSC\";\"5\"\n",
            );
            fs::write(&p, bytes).unwrap();
        }
        let map = dir.path().join("ibge.csv");
        fs::write(&map, "municipio_nome,municipio_ibge_id\nSão José dos Pinhais,4125506\n").unwrap();
        let dest = dir.path().join("out.csv");
        let summary =
            run_local_extraction(&root, &dest, &Target::default(), Some(map.as_path())).unwrap();
        assert!(summary.unresolved_municipios.is_empty());
        let rows = read_output(&dest);
        assert_eq!(rows.len(), 4);
        assert_eq!(&rows[0][5], "SÃO JOSÉ DOS PINHAIS");
        assert_eq!(&rows[0][4], "4125506");
    }

    #[test]
    fn remote_extraction_fills_nulls() {
        let dir = tempfile::tempdir().unwrap();
        let response = format!(
            r#"{{"jobComplete": true, "schema": {}, "rows": [{}, {}],
            "jobReference": {{"projectId": "p", "jobId": "job_1"}}}}"#,
            SCHEMA,
            row_js("2002", "CASCAVEL", Some("4104808"), "10"),
            row_js("2006", "TOLEDO", None, "20")
        );
        let api = FakeApi::new(&[response.as_str()]);
        let dest = dir.path().join("templates/eleicoes_paranhos.csv");
        let summary = run_remote_extraction(&api, &dest, &Target::default()).unwrap();
        assert_eq!(summary.rows_written, 2);
        assert_eq!(summary.null_cells, 3);
        assert_eq!(
            remote_summary_lines(&summary, "out.csv"),
            vec![
                "3 missing value(s) written as empty cells".to_string(),
                "✓ 2 rows written to out.csv".to_string()
            ]
        );

        let content = fs::read_to_string(&dest).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(
            lines[0],
            "ano,turno,cargo,uf,municipio_ibge_id,municipio_nome,candidato_nome,numero,partido_sigla,partido_nome,votos,percentual_votos_validos"
        );
        assert_eq!(
            lines[2],
            "2006,1,DEPUTADO ESTADUAL,PR,,TOLEDO,LEONALDO PARANHOS,20123,PSC,PARTIDO SOCIAL CRISTAO,20,"
        );
    }
}
