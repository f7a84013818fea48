use std::collections::BTreeMap;

pub use crate::config::*;

// The identifying tuple of an aggregated row.
type GroupKey = (i32, u32, String, String, String);

/// Sums the votes of the records that share the same identifying tuple:
/// year, round, state, municipality and candidate.
///
/// The other columns come from the first record of the group, except the
/// ballot number and the party: they come from the first record that has a
/// ballot number, so that a malformed number does not hide a valid one.
///
/// ```
/// use tse_votes::builder::Aggregator;
/// use tse_votes::VoteRecord;
///
/// let record = VoteRecord {
///     ano: 2010,
///     turno: 1,
///     cargo: "DEPUTADO ESTADUAL".to_string(),
///     uf: "PR".to_string(),
///     municipio_ibge_id: "".to_string(),
///     municipio_nome: "CURITIBA".to_string(),
///     candidato_nome: "LEONALDO PARANHOS".to_string(),
///     numero: Some(45123),
///     partido_sigla: "PSC".to_string(),
///     partido_nome: "PARTIDO SOCIAL CRISTAO".to_string(),
///     votos: 40,
/// };
///
/// let mut aggregator = Aggregator::new();
/// aggregator.add_record(record.clone());
/// aggregator.add_record(record);
/// let rows = aggregator.finish();
///
/// assert_eq!(rows.len(), 1);
/// assert_eq!(rows[0].votos, 80);
/// ```
#[derive(Debug, Default)]
pub struct Aggregator {
    groups: BTreeMap<GroupKey, VoteRecord>,
}

impl Aggregator {
    pub fn new() -> Aggregator {
        Aggregator {
            groups: BTreeMap::new(),
        }
    }

    /// Adds a record to its group.
    pub fn add_record(&mut self, record: VoteRecord) {
        let key: GroupKey = (
            record.ano,
            record.turno,
            record.uf.clone(),
            record.municipio_nome.clone(),
            record.candidato_nome.clone(),
        );
        match self.groups.get_mut(&key) {
            Some(existing) => {
                existing.votos += record.votos;
                if existing.numero.is_none() && record.numero.is_some() {
                    existing.numero = record.numero;
                    existing.partido_sigla = record.partido_sigla;
                    existing.partido_nome = record.partido_nome;
                }
            }
            None => {
                self.groups.insert(key, record);
            }
        }
    }

    pub fn add_records<I: IntoIterator<Item = VoteRecord>>(&mut self, records: I) {
        for r in records {
            self.add_record(r);
        }
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// The aggregated records, sorted by their identifying tuple.
    pub fn finish(self) -> Vec<VoteRecord> {
        self.groups.into_values().collect()
    }
}
