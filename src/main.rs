use clap::Parser;
use log::{error, info};
use std::process::ExitCode;

use media2yolo::{process_dataset, Args};

fn main() -> ExitCode {
    // Initialize the logger
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let sources = match args.to_sources() {
        Ok(sources) => sources,
        Err(e) => {
            error!("{}", e);
            return ExitCode::FAILURE;
        }
    };
    let config = match args.to_config() {
        Ok(config) => config,
        Err(e) => {
            error!("{}", e);
            return ExitCode::FAILURE;
        }
    };

    info!("Starting the preprocessing...");

    match process_dataset(&sources, &config) {
        Ok(report) => {
            println!("Dataset ready at: {}", report.output_dir.display());
            println!("YAML file created at: {}", report.manifest_path.display());
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("Failed to process dataset: {}", e);
            ExitCode::FAILURE
        }
    }
}
