//! decourse command-line interface

use clap::Parser;
use log::LevelFilter;

use decourse::cli::{parse_policy, Cli, Commands};
use decourse::prelude::*;
use decourse::{fit_contrasts, run_report};

fn main() {
    let cli = Cli::parse();

    let log_level = if cli.verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };
    env_logger::Builder::new()
        .filter_level(log_level)
        .format_timestamp(None)
        .init();

    let result = match cli.command {
        Commands::Run {
            counts,
            output,
            policy,
        } => match parse_policy(&policy) {
            Some(policy) => run_report(&counts, &ReportConfig::new(output, policy)),
            None => Err(PipelineError::MalformedInput {
                reason: format!(
                    "unknown policy '{}'; expected moderate, stringent or very-stringent",
                    policy
                ),
            }),
        },
        Commands::Contrasts { counts, output } => {
            fit_contrasts(&counts).and_then(|table| write_contrast_table(&output, &table))
        }
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
