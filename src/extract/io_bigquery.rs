// Access to the Base dos Dados tables through the BigQuery REST API.

use std::env;
use std::process::Command;

use reqwest::blocking::Client;
use tse_votes::{Target, VALID_VOTES_PERCENT_COLUMN, VOTE_RECORD_COLUMNS};

use crate::extract::*;

pub const BIGQUERY_URL: &str = "https://bigquery.googleapis.com/bigquery/v2";
pub const TOKEN_ENV_VAR: &str = "GOOGLE_OAUTH_ACCESS_TOKEN";

const RESULTS_TABLE: &str = "basedosdados.br_tse_eleicoes.resultados_candidato_municipio";

/// The query, with named parameters for everything that depends on the target.
pub fn query_text() -> String {
    format!(
        "SELECT
  ano,
  CAST(turno AS INT64) AS turno,
  cargo,
  sigla_uf AS uf,
  id_municipio AS municipio_ibge_id,
  municipio AS municipio_nome,
  nome_candidato AS candidato_nome,
  CAST(numero_candidato AS INT64) AS numero,
  sigla_partido AS partido_sigla,
  partido AS partido_nome,
  CAST(votos AS INT64) AS votos,
  pct_votos_validos AS percentual_votos_validos
FROM `{}`
WHERE
  cargo = @cargo AND
  sigla_uf = @uf AND
  ano IN UNNEST(@anos) AND
  (UPPER(nome_candidato) LIKE @nome_sobrenome OR UPPER(nome_candidato) LIKE @sobrenome_nome)
ORDER BY ano, municipio",
        RESULTS_TABLE
    )
}

fn string_parameter(name: &str, value: &str) -> JSValue {
    json!({
        "name": name,
        "parameterType": {"type": "STRING"},
        "parameterValue": {"value": value}
    })
}

/// The body of the `jobs.query` request.
pub fn build_query_request(target: &Target) -> JSValue {
    let (nome_sobrenome, sobrenome_nome) = target.like_patterns();
    let years: Vec<JSValue> = target
        .years
        .iter()
        .map(|y| json!({"value": y.to_string()}))
        .collect();
    json!({
        "query": query_text(),
        "useLegacySql": false,
        "parameterMode": "NAMED",
        "queryParameters": [
            string_parameter("cargo", &target.cargo),
            string_parameter("uf", &target.uf),
            {
                "name": "anos",
                "parameterType": {"type": "ARRAY", "arrayType": {"type": "INT64"}},
                "parameterValue": {"arrayValues": years}
            },
            string_parameter("nome_sobrenome", &nome_sobrenome),
            string_parameter("sobrenome_nome", &sobrenome_nome),
        ]
    })
}

// ******** Responses *********

#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct JobReference {
    #[serde(rename = "projectId")]
    pub project_id: String,
    #[serde(rename = "jobId")]
    pub job_id: String,
    pub location: Option<String>,
}

#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct TableField {
    pub name: String,
}

#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct TableSchema {
    pub fields: Vec<TableField>,
}

#[derive(PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct TableCell {
    pub v: JSValue,
}

#[derive(PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct TableRow {
    pub f: Vec<TableCell>,
}

/// The common part of the `jobs.query` and `jobs.getQueryResults` responses.
#[derive(PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct QueryResponse {
    #[serde(rename = "jobComplete")]
    pub job_complete: Option<bool>,
    #[serde(rename = "jobReference")]
    pub job_reference: Option<JobReference>,
    pub schema: Option<TableSchema>,
    pub rows: Option<Vec<TableRow>>,
    #[serde(rename = "pageToken")]
    pub page_token: Option<String>,
}

/// A result set, with the missing values kept as `None`.
#[derive(Eq, PartialEq, Debug, Clone, Default)]
pub struct QueryTable {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Option<String>>>,
}

fn cell_value(v: &JSValue) -> Option<String> {
    match v {
        JSValue::Null => None,
        JSValue::String(s) => Some(s.clone()),
        x => Some(x.to_string()),
    }
}

/// The two calls of the BigQuery API used by the extraction.
pub trait BigQueryApi {
    /// Starts a query (`jobs.query`).
    fn start_query(&self, request: &JSValue) -> ExtractResult<QueryResponse>;
    /// Fetches the state or the next page of a query (`jobs.getQueryResults`).
    fn query_results(
        &self,
        job: &JobReference,
        page_token: Option<&str>,
    ) -> ExtractResult<QueryResponse>;
}

/// Runs the query and collects all the pages of the result.
///
/// The job is polled until it completes. There is no timeout.
pub fn run_query<A: BigQueryApi>(api: &A, request: &JSValue) -> ExtractResult<QueryTable> {
    let mut table = QueryTable::default();
    let mut resp = api.start_query(request)?;
    let mut num_pages = 0;
    loop {
        let complete = resp.job_complete.unwrap_or(false);
        if complete {
            num_pages += 1;
            if table.columns.is_empty() {
                if let Some(schema) = &resp.schema {
                    table.columns = schema.fields.iter().map(|f| f.name.clone()).collect();
                }
            }
            let rows = resp.rows.take().unwrap_or_default();
            debug!("run_query: page {}: {} rows", num_pages, rows.len());
            for row in rows {
                table.rows.push(row.f.iter().map(|c| cell_value(&c.v)).collect());
            }
        }
        let page_token = if complete { resp.page_token.take() } else { None };
        if complete && page_token.is_none() {
            break;
        }
        let job = resp
            .job_reference
            .clone()
            .context(MissingJobReferenceSnafu {})?;
        if !complete {
            debug!("run_query: job {} not complete yet", job.job_id);
        }
        resp = api.query_results(&job, page_token.as_deref())?;
    }
    info!(
        "Query returned {} rows in {} page(s)",
        table.rows.len(),
        num_pages
    );
    Ok(table)
}

/// The output columns of the remote extraction.
pub fn remote_columns() -> Vec<String> {
    VOTE_RECORD_COLUMNS
        .iter()
        .chain([VALID_VOTES_PERCENT_COLUMN].iter())
        .map(|s| s.to_string())
        .collect()
}

/// Puts the columns in the canonical order and replaces the missing values
/// by empty strings.
pub fn canonical_rows(table: &QueryTable) -> ExtractResult<(Vec<String>, Vec<Vec<String>>)> {
    let columns = remote_columns();
    let mut indexes: Vec<usize> = Vec::with_capacity(columns.len());
    for c in columns.iter() {
        let idx = table
            .columns
            .iter()
            .position(|x| x == c)
            .context(MissingColumnSnafu {
                column: c.clone(),
                path: RESULTS_TABLE,
            })?;
        indexes.push(idx);
    }
    let rows: Vec<Vec<String>> = table
        .rows
        .iter()
        .map(|row| {
            indexes
                .iter()
                .map(|idx| row.get(*idx).cloned().flatten().unwrap_or_default())
                .collect()
        })
        .collect();
    Ok((columns, rows))
}

// ******** HTTP client *********

pub struct BigQueryClient {
    client: Client,
    base_url: String,
    project: String,
    token: String,
}

impl BigQueryClient {
    pub fn new(project: &str, token: &str) -> ExtractResult<BigQueryClient> {
        BigQueryClient::with_base_url(BIGQUERY_URL, project, token)
    }

    pub fn with_base_url(base_url: &str, project: &str, token: &str) -> ExtractResult<BigQueryClient> {
        let client = Client::builder().build().context(HttpSnafu {})?;
        Ok(BigQueryClient {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            project: project.to_string(),
            token: token.to_string(),
        })
    }

    fn read_response(resp: reqwest::blocking::Response) -> ExtractResult<QueryResponse> {
        let status = resp.status();
        let text = resp.text().context(HttpSnafu {})?;
        ensure!(
            status.is_success(),
            BigQueryStatusSnafu {
                status: status.as_u16(),
                body: text
            }
        );
        serde_json::from_str(&text).context(ParsingJsonSnafu {})
    }
}

impl BigQueryApi for BigQueryClient {
    fn start_query(&self, request: &JSValue) -> ExtractResult<QueryResponse> {
        let url = format!("{}/projects/{}/queries", self.base_url, self.project);
        info!("Running query in project {}", self.project);
        debug!("start_query: {}", request);
        let resp = self
            .client
            .post(url)
            .bearer_auth(&self.token)
            .json(request)
            .send()
            .context(HttpSnafu {})?;
        BigQueryClient::read_response(resp)
    }

    fn query_results(
        &self,
        job: &JobReference,
        page_token: Option<&str>,
    ) -> ExtractResult<QueryResponse> {
        let url = format!(
            "{}/projects/{}/queries/{}",
            self.base_url, job.project_id, job.job_id
        );
        let mut params: Vec<(&str, &str)> = Vec::new();
        if let Some(loc) = job.location.as_deref() {
            params.push(("location", loc));
        }
        if let Some(t) = page_token {
            params.push(("pageToken", t));
        }
        let resp = self
            .client
            .get(url)
            .bearer_auth(&self.token)
            .query(&params)
            .send()
            .context(HttpSnafu {})?;
        BigQueryClient::read_response(resp)
    }
}

/// Finds an access token: the given one, then the environment, then gcloud.
pub fn resolve_token(given: Option<&str>) -> ExtractResult<String> {
    if let Some(t) = given.map(str::trim).filter(|t| !t.is_empty()) {
        return Ok(t.to_string());
    }
    if let Ok(t) = env::var(TOKEN_ENV_VAR) {
        if !t.trim().is_empty() {
            debug!("resolve_token: using {}", TOKEN_ENV_VAR);
            return Ok(t.trim().to_string());
        }
    }
    debug!("resolve_token: asking gcloud for a token");
    match Command::new("gcloud")
        .args(["auth", "print-access-token"])
        .output()
    {
        Ok(out) if out.status.success() => {
            let t = String::from_utf8_lossy(&out.stdout).trim().to_string();
            ensure!(!t.is_empty(), MissingTokenSnafu {});
            Ok(t)
        }
        Ok(out) => {
            warn!(
                "gcloud auth print-access-token failed: {}",
                String::from_utf8_lossy(&out.stderr).trim()
            );
            MissingTokenSnafu {}.fail()
        }
        Err(e) => {
            warn!("could not run gcloud: {}", e);
            MissingTokenSnafu {}.fail()
        }
    }
}
