use clap::Parser;
use log::{info, LevelFilter};
use std::path::Path;
use std::process;

use eleicoes_extract::args::LocalArgs;
use eleicoes_extract::extract::{
    config_reader::read_target, print_local_summary, report_error, run_local_extraction,
    ExtractResult,
};

fn run(args: &LocalArgs) -> ExtractResult<()> {
    let target = read_target(args.config.as_deref())?;
    let summary = run_local_extraction(
        Path::new(&args.root),
        Path::new(&args.dest),
        &target,
        args.ibge_map.as_deref().map(Path::new),
    )?;
    print_local_summary(&summary, &args.dest);
    Ok(())
}

fn main() {
    let args = LocalArgs::parse();
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
