//! CLI argument definitions for the sheetjson converter.

use std::path::PathBuf;

use clap::{ArgAction, Parser, ValueEnum};
use sheetjson::{Audience, JsonStyle, SheetSelector};

#[derive(Debug, Parser)]
#[command(
    name = "sheetjson",
    version,
    about = "Convert header-protocol spreadsheet tables into JSON",
    long_about = "Convert every dataset listed in a registry file into JSON.\n\n\
                  Each dataset is converted once per audience and written to\n\
                  <OUTPUT>/client/<file>.json and <OUTPUT>/server/<file>.json."
)]
pub struct Cli {
    /// Directory containing the spreadsheet files.
    #[arg(short, long, value_name = "DIR")]
    pub input: PathBuf,

    /// Directory receiving the client/ and server/ JSON folders.
    #[arg(short, long, value_name = "DIR")]
    pub output: PathBuf,

    /// Registry file listing datasets and their record schemas.
    #[arg(short, long, value_name = "FILE")]
    pub registry: PathBuf,

    /// Audience to generate.
    #[arg(long, value_enum, default_value = "both")]
    pub audience: AudienceArg,

    /// Pretty-print the JSON output.
    #[arg(long)]
    pub pretty: bool,

    /// Read the sheet at this index (0-based, default: first sheet).
    #[arg(long, value_name = "N", conflicts_with = "sheet_name")]
    pub sheet_index: Option<usize>,

    /// Read the sheet with this name.
    #[arg(long, value_name = "NAME")]
    pub sheet_name: Option<String>,

    /// Spreadsheet file extension, including the dot.
    #[arg(long, value_name = "EXT", default_value = ".xlsx")]
    pub extension: String,

    /// Increase log verbosity (-v for debug, -vv for trace).
    #[arg(short, long, action = ArgAction::Count)]
    pub verbose: u8,

    /// Log output format.
    #[arg(long = "log-format", value_enum, default_value = "compact")]
    pub log_format: LogFormatArg,
}

impl Cli {
    pub fn audiences(&self) -> &'static [Audience] {
        match self.audience {
            AudienceArg::Client => &[Audience::Client],
            AudienceArg::Server => &[Audience::Server],
            AudienceArg::Both => &Audience::ALL,
        }
    }

    pub fn sheet_selector(&self) -> SheetSelector {
        match (&self.sheet_name, self.sheet_index) {
            (Some(name), _) => SheetSelector::Name(name.clone()),
            (None, Some(index)) => SheetSelector::Index(index),
            (None, None) => SheetSelector::default(),
        }
    }

    pub fn json_style(&self) -> JsonStyle {
        if self.pretty {
            JsonStyle::Pretty
        } else {
            JsonStyle::Compact
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum AudienceArg {
    Client,
    Server,
    Both,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormatArg {
    Pretty,
    Compact,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Result<Cli, clap::Error> {
        let mut full = vec!["sheetjson", "-i", "tables", "-o", "json", "-r", "registry.json"];
        full.extend_from_slice(args);
        Cli::try_parse_from(full)
    }

    #[test]
    fn test_defaults() {
        let cli = parse(&[]).unwrap();
        assert_eq!(cli.input, PathBuf::from("tables"));
        assert_eq!(cli.audiences(), &Audience::ALL);
        assert_eq!(cli.sheet_selector(), SheetSelector::Index(0));
        assert_eq!(cli.json_style(), JsonStyle::Compact);
        assert_eq!(cli.extension, ".xlsx");
        assert_eq!(cli.verbose, 0);
    }

    #[test]
    fn test_options() {
        let cli = parse(&["--audience", "server", "--pretty", "--sheet-name", "Data", "-vv"]).unwrap();
        assert_eq!(cli.audiences(), &[Audience::Server]);
        assert_eq!(cli.sheet_selector(), SheetSelector::Name("Data".to_string()));
        assert_eq!(cli.json_style(), JsonStyle::Pretty);
        assert_eq!(cli.verbose, 2);
    }

    #[test]
    fn test_sheet_options_conflict() {
        assert!(parse(&["--sheet-index", "1", "--sheet-name", "Data"]).is_err());
    }

    #[test]
    fn test_required_arguments() {
        assert!(Cli::try_parse_from(["sheetjson", "-i", "tables"]).is_err());
    }
}
