use clap::Parser;

pub const DEFAULT_DEST: &str = "templates/eleicoes_paranhos.csv";

/// Extracts the votes per municipality of a candidate from the Base dos Dados
/// warehouse (BigQuery).
#[derive(Parser, Debug, Clone)]
#[clap(author, version, about, long_about = None)]
pub struct RemoteArgs {
    /// (GCP project id) The project used to run the query. It must have access to BigQuery.
    #[clap(long, value_parser)]
    pub project: String,

    /// (file path) Where the CSV output is written. An existing file is overwritten.
    #[clap(long, value_parser, default_value = DEFAULT_DEST)]
    pub dest: String,

    /// (OAuth access token, optional) If not provided, the GOOGLE_OAUTH_ACCESS_TOKEN
    /// environment variable is used, then the output of `gcloud auth print-access-token`.
    #[clap(long, value_parser)]
    pub token: Option<String>,

    /// (file path, optional) A JSON file overriding the years, state, office or candidate
    /// to extract.
    #[clap(long, value_parser)]
    pub config: Option<String>,

    // Other arguments
    /// If passed as an argument, will turn on verbose logging to the standard error.
    #[clap(long, takes_value = false)]
    pub verbose: bool,
}

/// Extracts the votes per municipality of a candidate from the TSE
/// `votacao_candidato_munzona` CSV files.
#[derive(Parser, Debug, Clone)]
#[clap(author, version, about, long_about = None)]
pub struct LocalArgs {
    /// (directory) The root directory, containing one sub-directory per election year
    /// (2002, 2006, ...) with the extracted TSE files.
    #[clap(long, value_parser)]
    pub root: String,

    /// (file path) Where the CSV output is written. An existing file is overwritten.
    #[clap(long, value_parser, default_value = DEFAULT_DEST)]
    pub dest: String,

    /// (file path, optional) A JSON file overriding the years, state, office or candidate
    /// to extract.
    #[clap(long, value_parser)]
    pub config: Option<String>,

    /// (file path, optional) A CSV file with the names and IBGE codes of the
    /// municipalities. If provided, it is used to fill the municipio_ibge_id column.
    #[clap(long, value_parser)]
    pub ibge_map: Option<String>,

    // Other arguments
    /// If passed as an argument, will turn on verbose logging to the standard error.
    #[clap(long, takes_value = false)]
    pub verbose: bool,
}
