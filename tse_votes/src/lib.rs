mod config;
pub mod builder;

use log::debug;

pub use crate::builder::Aggregator;
pub use crate::config::*;

// **** Private structures ****

// Positions of the canonical fields in a raw table, once a scheme is chosen.
#[derive(Eq, PartialEq, Debug, Clone, Copy)]
struct ResolvedColumns {
    ano: usize,
    turno: usize,
    cargo: usize,
    uf: usize,
    municipio: usize,
    candidato: usize,
    numero: usize,
    partido_sigla: usize,
    partido_nome: usize,
    votos: usize,
}

impl ResolvedColumns {
    fn max_index(&self) -> usize {
        [
            self.ano,
            self.turno,
            self.cargo,
            self.uf,
            self.municipio,
            self.candidato,
            self.numero,
            self.partido_sigla,
            self.partido_nome,
            self.votos,
        ]
        .into_iter()
        .max()
        .unwrap_or(0)
    }
}

fn resolve(scheme: &ColumnScheme, table: &RawTable) -> Option<ResolvedColumns> {
    Some(ResolvedColumns {
        ano: table.column_index(scheme.ano)?,
        turno: table.column_index(scheme.turno)?,
        cargo: table.column_index(scheme.cargo)?,
        uf: table.column_index(scheme.uf)?,
        municipio: table.column_index(scheme.municipio)?,
        candidato: table.column_index(scheme.candidato)?,
        numero: table.column_index(scheme.numero)?,
        partido_sigla: table.column_index(scheme.partido_sigla)?,
        partido_nome: table.column_index(scheme.partido_nome)?,
        votos: table.column_index(scheme.votos)?,
    })
}

/// Returns the first scheme of the list whose source columns are all present
/// in the header of the table.
pub fn find_scheme<'a>(schemes: &'a [ColumnScheme], table: &RawTable) -> Option<&'a ColumnScheme> {
    schemes.iter().find(|s| resolve(s, table).is_some())
}

// Integers in the TSE files are sometimes written with a decimal part ("123.0").
fn parse_integer(s: &str) -> Option<i64> {
    let t = s.trim();
    if let Ok(x) = t.parse::<i64>() {
        return Some(x);
    }
    match t.parse::<f64>() {
        Ok(f) if f.is_finite() && f.fract() == 0.0 => Some(f as i64),
        _ => None,
    }
}

/// Converts a raw table into canonical records, using the given schemes in order.
///
/// Arguments:
/// * `table` the table, as read from one file
/// * `year` the election year being processed. It is used when the year column
/// cannot be read.
/// * `schemes` the known column schemes, tried in order
///
/// Numbers that cannot be read do not abort the conversion: the votes become 0,
/// the ballot number becomes null and the round becomes 0.
pub fn harmonize_with(
    table: &RawTable,
    year: i32,
    schemes: &[ColumnScheme],
) -> Result<Vec<VoteRecord>, HarmonizeError> {
    let (scheme, cols) = schemes
        .iter()
        .find_map(|s| resolve(s, table).map(|cols| (s, cols)))
        .ok_or_else(|| HarmonizeError::UnknownColumns {
            year,
            headers: table.headers.clone(),
        })?;
    debug!(
        "harmonize: year {}: using scheme {:?} for {} rows",
        year,
        scheme.name,
        table.rows.len()
    );

    let min_len = cols.max_index() + 1;
    let mut res: Vec<VoteRecord> = Vec::with_capacity(table.rows.len());
    for (idx, row) in table.rows.iter().enumerate() {
        if row.len() < min_len {
            return Err(HarmonizeError::ShortRow {
                year,
                lineno: idx + 2,
            });
        }
        let cell = |i: usize| row[i].trim().to_string();
        let votos = parse_integer(&row[cols.votos])
            .map(|v| v.max(0) as u64)
            .unwrap_or(0);
        res.push(VoteRecord {
            ano: parse_integer(&row[cols.ano])
                .and_then(|x| i32::try_from(x).ok())
                .unwrap_or(year),
            turno: parse_integer(&row[cols.turno])
                .and_then(|x| u32::try_from(x).ok())
                .unwrap_or(0),
            cargo: cell(cols.cargo),
            uf: cell(cols.uf),
            municipio_ibge_id: "".to_string(),
            municipio_nome: cell(cols.municipio),
            candidato_nome: cell(cols.candidato),
            numero: parse_integer(&row[cols.numero]),
            partido_sigla: cell(cols.partido_sigla),
            partido_nome: cell(cols.partido_nome),
            votos,
        });
    }
    Ok(res)
}

/// Converts a raw table with the default list of schemes.
pub fn harmonize(table: &RawTable, year: i32) -> Result<Vec<VoteRecord>, HarmonizeError> {
    harmonize_with(table, year, COLUMN_SCHEMES)
}

/// True if the record belongs to the target: same state, an office containing
/// the target office and a candidate name containing one of the name variants.
/// Office and name comparisons ignore the case.
pub fn matches_target(record: &VoteRecord, target: &Target) -> bool {
    if record.uf != target.uf {
        return false;
    }
    if !record
        .cargo
        .to_uppercase()
        .contains(&target.cargo.to_uppercase())
    {
        return false;
    }
    let name = record.candidato_nome.to_uppercase();
    target
        .name_variants
        .iter()
        .any(|pat| name.contains(&pat.to_uppercase()))
}
