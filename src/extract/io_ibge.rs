// Optional resolution of the IBGE municipality codes.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::path::Path;

use crate::extract::{
    io_common::{name_key, read_with_fallback},
    *,
};

const NAME_COLUMNS: [&str; 3] = ["municipio_nome", "nome", "municipio"];
const ID_COLUMNS: [&str; 3] = ["municipio_ibge_id", "ibge", "codigo_ibge"];
const UF_COLUMNS: [&str; 2] = ["uf", "sigla_uf"];

/// The IBGE code of each municipality, indexed by normalized name.
#[derive(Eq, PartialEq, Debug, Clone, Default)]
pub struct IbgeMap {
    codes: HashMap<String, String>,
}

impl IbgeMap {
    pub fn lookup(&self, municipio_nome: &str) -> Option<&str> {
        self.codes.get(&name_key(municipio_nome)).map(|s| s.as_str())
    }

    pub fn len(&self) -> usize {
        self.codes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.codes.is_empty()
    }

    /// Fills the geographic id of the records and returns the names that could
    /// not be resolved.
    pub fn apply(&self, records: &mut [VoteRecord]) -> Vec<String> {
        let mut unresolved: BTreeSet<String> = BTreeSet::new();
        for r in records.iter_mut() {
            match self.lookup(&r.municipio_nome) {
                Some(code) => r.municipio_ibge_id = code.to_string(),
                None => {
                    unresolved.insert(r.municipio_nome.clone());
                }
            }
        }
        unresolved.into_iter().collect()
    }
}

fn find_column(table: &RawTable, candidates: &[&str]) -> Option<usize> {
    candidates.iter().find_map(|c| {
        table
            .headers
            .iter()
            .position(|h| h.trim().eq_ignore_ascii_case(c))
    })
}

/// Reads the IBGE codes of the municipalities of the state `uf`.
///
/// When the file has a state column, the rows of the other states are ignored.
/// A name with several different codes is left out of the map.
pub fn read_ibge_map(path: &Path, uf: &str) -> ExtractResult<IbgeMap> {
    info!("Attempting to read IBGE map {:?}", path);
    let table = read_with_fallback(path)?;
    let (name_idx, id_idx) = match (
        find_column(&table, &NAME_COLUMNS),
        find_column(&table, &ID_COLUMNS),
    ) {
        (Some(n), Some(i)) => (n, i),
        _ => whatever!(
            "IBGE map {:?} needs one of the columns {:?} and one of {:?}, found {:?}",
            path,
            NAME_COLUMNS,
            ID_COLUMNS,
            table.headers
        ),
    };
    let uf_idx = find_column(&table, &UF_COLUMNS);
    if uf_idx.is_none() {
        debug!("read_ibge_map: no state column, using all the rows");
    }

    let mut codes: HashMap<String, String> = HashMap::new();
    let mut ambiguous: HashSet<String> = HashSet::new();
    for row in table.rows.iter() {
        if let Some(i) = uf_idx {
            if !row[i].trim().eq_ignore_ascii_case(uf) {
                continue;
            }
        }
        let name = name_key(&row[name_idx]);
        let code = row[id_idx].trim().to_string();
        if name.is_empty() || code.is_empty() {
            continue;
        }
        if let Some(previous) = codes.get(&name) {
            if *previous != code {
                warn!(
                    "read_ibge_map: {} has several codes ({} and {}), leaving it unresolved",
                    name, previous, code
                );
                ambiguous.insert(name);
            }
            continue;
        }
        codes.insert(name, code);
    }
    for name in ambiguous.iter() {
        codes.remove(name);
    }
    debug!("read_ibge_map: {} municipalities", codes.len());
    Ok(IbgeMap { codes })
}
