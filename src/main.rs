//! sheetjson CLI.

use std::io::{self, IsTerminal};

use clap::Parser;
use sheetjson::{config, BatchConverter, ConverterBuilder, SheetJsonError};

mod cli;
mod logging;

use crate::cli::{Cli, LogFormatArg};
use crate::logging::{init_logging, LogConfig, LogFormat};

fn main() {
    let cli = Cli::parse();
    init_logging(&log_config_from_cli(&cli));

    let exit_code = match run(&cli) {
        Ok(all_succeeded) => {
            if all_succeeded {
                0
            } else {
                1
            }
        }
        Err(error) => {
            eprintln!("error: [{}] {error}", error.kind());
            2
        }
    };
    std::process::exit(exit_code);
}

/// Run the batch conversion and print the report.
///
/// Returns whether every dataset succeeded.
fn run(cli: &Cli) -> Result<bool, SheetJsonError> {
    let registry = config::load_registry(&cli.registry)?;
    let converter = ConverterBuilder::new()
        .with_sheet_selector(cli.sheet_selector())
        .with_extension(cli.extension.clone())
        .with_json_style(cli.json_style())
        .build()?;

    let report = BatchConverter::new(converter)
        .with_audiences(cli.audiences())
        .run(&registry, &cli.input, &cli.output)?;

    print!("{}", report.diagnostics);
    for line in &report.file_list {
        println!("{line}");
    }
    Ok(report.is_success())
}

fn log_config_from_cli(cli: &Cli) -> LogConfig {
    let format = match cli.log_format {
        LogFormatArg::Pretty => LogFormat::Pretty,
        LogFormatArg::Compact => LogFormat::Compact,
    };
    LogConfig::from_verbosity(cli.verbose)
        .with_format(format)
        .with_ansi(io::stderr().is_terminal())
}
