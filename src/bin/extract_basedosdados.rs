use clap::Parser;
use log::{info, LevelFilter};
use std::path::Path;
use std::process;

use eleicoes_extract::args::RemoteArgs;
use eleicoes_extract::extract::{
    config_reader::read_target,
    io_bigquery::{resolve_token, BigQueryClient},
    print_remote_summary, report_error, run_remote_extraction, ExtractResult,
};

fn run(args: &RemoteArgs) -> ExtractResult<()> {
    let target = read_target(args.config.as_deref())?;
    let token = resolve_token(args.token.as_deref())?;
    let client = BigQueryClient::new(&args.project, &token)?;
    let summary = run_remote_extraction(&client, Path::new(&args.dest), &target)?;
    print_remote_summary(&summary, &args.dest);
    Ok(())
}

fn main() {
    let args = RemoteArgs::parse();
    if args.verbose {
        env_logger::Builder::from_default_env()
            .filter_level(LevelFilter::Debug)
            .init();
    } else {
        env_logger::init();
    }
    info!("args: {:?}", args);

    if let Err(e) = run(&args) {
        report_error(&e);
        process::exit(1);
    }
}
