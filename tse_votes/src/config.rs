// ********* Input data structures ***********

use std::error::Error;
use std::fmt::Display;

use serde::Serialize;

/// A table as read from a TSE extract, before any interpretation.
///
/// All the cells are kept as strings: the conversion to numbers happens
/// during harmonization, where bad values are coerced instead of rejected.
#[derive(Eq, PartialEq, Debug, Clone, Default)]
pub struct RawTable {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl RawTable {
    pub fn new(headers: Vec<String>, rows: Vec<Vec<String>>) -> RawTable {
        RawTable { headers, rows }
    }

    /// Position of the column with the given name, ignoring surrounding spaces.
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h.trim() == name)
    }
}

/// The mapping between the columns of one vintage of the TSE files and the
/// canonical fields.
#[derive(Eq, PartialEq, Debug, Clone, Copy)]
pub struct ColumnScheme {
    pub name: &'static str,
    pub ano: &'static str,
    pub turno: &'static str,
    pub cargo: &'static str,
    pub uf: &'static str,
    pub municipio: &'static str,
    pub candidato: &'static str,
    pub numero: &'static str,
    pub partido_sigla: &'static str,
    pub partido_nome: &'static str,
    pub votos: &'static str,
}

impl ColumnScheme {
    pub fn source_columns(&self) -> [&'static str; 10] {
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
    }
}

/// The known schemes, in the order in which they are tried.
/// New vintages go at the end of this list.
pub const COLUMN_SCHEMES: &[ColumnScheme] = &[
    ColumnScheme {
        name: "2010+",
        ano: "ANO_ELEICAO",
        turno: "NUM_TURNO",
        cargo: "DS_CARGO",
        uf: "SG_UF",
        municipio: "NM_MUNICIPIO",
        candidato: "NM_CANDIDATO",
        numero: "NR_CANDIDATO",
        partido_sigla: "SG_PARTIDO",
        partido_nome: "NM_PARTIDO",
        votos: "QT_VOTOS_NOMINAIS",
    },
    ColumnScheme {
        name: "pre-2010",
        ano: "ANO_ELEICAO",
        turno: "NUM_TURNO",
        cargo: "DS_CARGO",
        uf: "SG_UF",
        municipio: "NM_MUNICIPIO",
        candidato: "NM_VOTAVEL",
        numero: "NR_VOTAVEL",
        partido_sigla: "SG_PARTIDO",
        partido_nome: "NM_PARTIDO",
        votos: "QT_VOTOS_NOMINAIS",
    },
];

/// What to extract: one candidate, one office, one state, several elections.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct Target {
    pub years: Vec<i32>,
    pub uf: String,
    pub cargo: String,
    pub first_name: String,
    pub last_name: String,
    /// Substrings searched in the uppercased candidate name.
    pub name_variants: Vec<String>,
}

impl Target {
    pub const DEFAULT_YEARS: [i32; 4] = [2002, 2006, 2010, 2014];

    /// The candidate name patterns, in the SQL `LIKE` syntax, for both orderings
    /// of the first and last names.
    pub fn like_patterns(&self) -> (String, String) {
        let first = self.first_name.to_uppercase();
        let last = self.last_name.to_uppercase();
        (
            format!("{}%{}%", first, last),
            format!("{}%{}%", last, first),
        )
    }
}

impl Default for Target {
    fn default() -> Target {
        Target {
            years: Target::DEFAULT_YEARS.to_vec(),
            uf: "PR".to_string(),
            cargo: "DEPUTADO ESTADUAL".to_string(),
            first_name: "LEONALDO".to_string(),
            last_name: "PARANHOS".to_string(),
            name_variants: vec![
                "LEONALDO PARANHOS".to_string(),
                "LEONALDO PARANHOS DA SILVA".to_string(),
                "PARANHOS LEONALDO".to_string(),
            ],
        }
    }
}

// ******** Output data structures *********

/// One row of the canonical output.
///
/// The field order is the column order of the output files.
#[derive(Eq, PartialEq, Debug, Clone, Serialize)]
pub struct VoteRecord {
    pub ano: i32,
    pub turno: u32,
    pub cargo: String,
    pub uf: String,
    pub municipio_ibge_id: String,
    pub municipio_nome: String,
    pub candidato_nome: String,
    pub numero: Option<i64>,
    pub partido_sigla: String,
    pub partido_nome: String,
    pub votos: u64,
}

/// The canonical columns, as written by the local extraction.
pub const VOTE_RECORD_COLUMNS: [&str; 11] = [
    "ano",
    "turno",
    "cargo",
    "uf",
    "municipio_ibge_id",
    "municipio_nome",
    "candidato_nome",
    "numero",
    "partido_sigla",
    "partido_nome",
    "votos",
];

/// The extra column only available from the warehouse.
pub const VALID_VOTES_PERCENT_COLUMN: &str = "percentual_votos_validos";

/// Errors that prevent a table from being converted to the canonical schema.
#[derive(Eq, PartialEq, Debug, Clone)]
pub enum HarmonizeError {
    /// None of the known schemes has all its columns in the header.
    UnknownColumns { year: i32, headers: Vec<String> },
    /// A row is shorter than the header.
    ShortRow { year: i32, lineno: usize },
}

impl Error for HarmonizeError {}

impl Display for HarmonizeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HarmonizeError::UnknownColumns { year, headers } => write!(
                f,
                "could not harmonize the columns for year {}: {:?}",
                year, headers
            ),
            HarmonizeError::ShortRow { year, lineno } => {
                write!(f, "row {} of year {} is shorter than its header", lineno, year)
            }
        }
    }
}
