use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

#[derive(Debug, Parser)]
#[command(author, version, about = "Reconcile agent contact lists", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Normalize headers and values for matching or display
    Normalize(NormalizeArgs),
    /// Validate field values against pattern rules, blanking failures
    Clean(CleanArgs),
    /// Unfold wide phone slots into one row per phone number
    Melt(MeltArgs),
    /// Cross-match an input list against a reference list
    Match(MatchArgs),
    /// Collapse duplicate identities, keeping the most complete row
    Dedup(DedupArgs),
    /// Combine same-schema CSV files into a single master table
    Combine(CombineArgs),
    /// Report candidate rows whose key is absent from a primary table
    Missing(MissingArgs),
    /// Preview the first few rows of a CSV file in a formatted table
    Preview(PreviewArgs),
}

/// Value casing applied to output tables.
///
/// `fold` lowercases for matching; `title` title-cases for display. The two
/// are separate operations and are never combined.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
#[value(rename_all = "kebab-case")]
pub enum CasePolicy {
    Fold,
    Title,
}

/// Identity signals available to the cross-match engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, ValueEnum)]
#[value(rename_all = "kebab-case")]
pub enum MatchKey {
    /// First and last name pair
    Name,
    /// Any of the reference's three phone slots against the input's phone
    Phone,
    Email,
    AgentId,
    OfficeId,
}

#[derive(Debug, Args)]
pub struct NormalizeArgs {
    /// Input CSV file
    #[arg(short = 'i', long = "input")]
    pub input: PathBuf,
    /// Output CSV file (stdout if omitted)
    #[arg(short = 'o', long = "output")]
    pub output: Option<PathBuf>,
    /// Value casing mode (fold for matching, title for display)
    #[arg(long = "casing", value_enum, default_value = "fold")]
    pub casing: CasePolicy,
    /// Phone columns to clean (defaults to the role map's contact columns)
    #[arg(long = "phones", value_delimiter = ',')]
    pub phones: Vec<String>,
    /// Field-role map file (.yaml or .json; defaults to the built-in contact roles)
    #[arg(long = "roles")]
    pub roles: Option<PathBuf>,
    /// Skip phone-number cleaning entirely
    #[arg(long = "no-phones")]
    pub no_phones: bool,
    /// CSV delimiter character (supports ',', 'tab', ';', '|')
    #[arg(long, value_parser = parse_delimiter)]
    pub delimiter: Option<u8>,
    /// Delimiter to use for output (defaults to input delimiter)
    #[arg(long = "output-delimiter", value_parser = parse_delimiter)]
    pub output_delimiter: Option<u8>,
    /// Character encoding of the input file (defaults to utf-8)
    #[arg(long = "input-encoding")]
    pub input_encoding: Option<String>,
}

#[derive(Debug, Args)]
pub struct CleanArgs {
    /// Input CSV file
    #[arg(short = 'i', long = "input")]
    pub input: PathBuf,
    /// Output CSV file (stdout if omitted)
    #[arg(short = 'o', long = "output")]
    pub output: Option<PathBuf>,
    /// Validation rule file (.yaml or .json; defaults to the built-in contact rules)
    #[arg(short = 'r', long = "rules")]
    pub rules: Option<PathBuf>,
    /// Keep columns that have no validation rule instead of dropping them
    #[arg(long = "keep-extra")]
    pub keep_extra: bool,
    /// CSV delimiter character (supports ',', 'tab', ';', '|')
    #[arg(long, value_parser = parse_delimiter)]
    pub delimiter: Option<u8>,
    /// Delimiter to use for output (defaults to input delimiter)
    #[arg(long = "output-delimiter", value_parser = parse_delimiter)]
    pub output_delimiter: Option<u8>,
    /// Character encoding of the input file (defaults to utf-8)
    #[arg(long = "input-encoding")]
    pub input_encoding: Option<String>,
}

#[derive(Debug, Args)]
pub struct MeltArgs {
    /// Input CSV file with wide phone slots
    #[arg(short = 'i', long = "input")]
    pub input: PathBuf,
    /// Output CSV file (stdout if omitted)
    #[arg(short = 'o', long = "output")]
    pub output: Option<PathBuf>,
    /// Drop unfolded rows whose phone slot was empty
    #[arg(long = "drop-empty")]
    pub drop_empty: bool,
    /// CSV delimiter character (supports ',', 'tab', ';', '|')
    #[arg(long, value_parser = parse_delimiter)]
    pub delimiter: Option<u8>,
    /// Delimiter to use for output (defaults to input delimiter)
    #[arg(long = "output-delimiter", value_parser = parse_delimiter)]
    pub output_delimiter: Option<u8>,
    /// Character encoding of the input file (defaults to utf-8)
    #[arg(long = "input-encoding")]
    pub input_encoding: Option<String>,
}

#[derive(Debug, Args)]
pub struct MatchArgs {
    /// Input list to reconcile
    #[arg(short = 'i', long = "input")]
    pub input: PathBuf,
    /// Reference (master) list to match against
    #[arg(short = 'r', long = "reference")]
    pub reference: PathBuf,
    /// Output CSV file (stdout if omitted)
    #[arg(short = 'o', long = "output")]
    pub output: Option<PathBuf>,
    /// Match keys to union (name, phone, email, agent-id, office-id)
    #[arg(short = 'k', long = "keys", value_enum, value_delimiter = ',', required = true)]
    pub keys: Vec<MatchKey>,
    /// Identity columns used to collapse duplicate matches
    #[arg(long = "identity", value_delimiter = ',', default_value = "first_name,last_name")]
    pub identity: Vec<String>,
    /// Input-only columns to carry into the output
    #[arg(long = "retain", value_delimiter = ',')]
    pub retain: Vec<String>,
    /// Value casing applied to the matched output
    #[arg(long = "casing", value_enum, default_value = "title")]
    pub casing: CasePolicy,
    /// Emit matched records as a JSON array instead of CSV
    #[arg(long = "json")]
    pub json: bool,
    /// CSV delimiter character for both inputs
    #[arg(long, value_parser = parse_delimiter)]
    pub delimiter: Option<u8>,
    /// Character encoding of the input list (defaults to utf-8)
    #[arg(long = "input-encoding")]
    pub input_encoding: Option<String>,
    /// Character encoding of the reference list (defaults to utf-8)
    #[arg(long = "reference-encoding")]
    pub reference_encoding: Option<String>,
}

#[derive(Debug, Args)]
pub struct DedupArgs {
    /// Input CSV file
    #[arg(short = 'i', long = "input")]
    pub input: PathBuf,
    /// Output CSV file (stdout if omitted)
    #[arg(short = 'o', long = "output")]
    pub output: Option<PathBuf>,
    /// Identity columns defining a duplicate
    #[arg(long = "identity", value_delimiter = ',', default_value = "first_name,last_name")]
    pub identity: Vec<String>,
    /// CSV delimiter character (supports ',', 'tab', ';', '|')
    #[arg(long, value_parser = parse_delimiter)]
    pub delimiter: Option<u8>,
    /// Delimiter to use for output (defaults to input delimiter)
    #[arg(long = "output-delimiter", value_parser = parse_delimiter)]
    pub output_delimiter: Option<u8>,
    /// Character encoding of the input file (defaults to utf-8)
    #[arg(long = "input-encoding")]
    pub input_encoding: Option<String>,
}

#[derive(Debug, Args)]
pub struct CombineArgs {
    /// CSV files to combine
    #[arg(short = 'i', long = "input", action = clap::ArgAction::Append)]
    pub inputs: Vec<PathBuf>,
    /// Folders whose *.csv files are combined (sorted by file name)
    #[arg(short = 'd', long = "dir", action = clap::ArgAction::Append)]
    pub dirs: Vec<PathBuf>,
    /// Output CSV file (stdout if omitted)
    #[arg(short = 'o', long = "output")]
    pub output: Option<PathBuf>,
    /// Expected column set (defaults to the standard master columns)
    #[arg(short = 'C', long = "columns", value_delimiter = ',')]
    pub columns: Vec<String>,
    /// Normalize phone slots before concatenation
    #[arg(long = "clean-phones")]
    pub clean_phones: bool,
    /// CSV delimiter character (supports ',', 'tab', ';', '|')
    #[arg(long, value_parser = parse_delimiter)]
    pub delimiter: Option<u8>,
    /// Character encoding for input files (defaults to utf-8)
    #[arg(long = "input-encoding")]
    pub input_encoding: Option<String>,
}

#[derive(Debug, Args)]
pub struct MissingArgs {
    /// Primary table whose keys define "already present"
    #[arg(short = 'p', long = "primary")]
    pub primary: PathBuf,
    /// Candidate table to scan for absent keys
    #[arg(short = 'c', long = "candidate")]
    pub candidate: PathBuf,
    /// Output CSV file (stdout if omitted)
    #[arg(short = 'o', long = "output")]
    pub output: Option<PathBuf>,
    /// Key columns compared as full tuples
    #[arg(short = 'k', long = "keys", value_delimiter = ',', default_value = "first_name,last_name")]
    pub keys: Vec<String>,
    /// CSV delimiter character for both inputs
    #[arg(long, value_parser = parse_delimiter)]
    pub delimiter: Option<u8>,
    /// Character encoding for input files (defaults to utf-8)
    #[arg(long = "input-encoding")]
    pub input_encoding: Option<String>,
}

#[derive(Debug, Args)]
pub struct PreviewArgs {
    /// Input CSV file to preview
    #[arg(short = 'i', long = "input")]
    pub input: PathBuf,
    /// Number of rows to display
    #[arg(long, default_value_t = 10)]
    pub rows: usize,
    /// CSV delimiter character (supports ',', 'tab', ';', '|')
    #[arg(long, value_parser = parse_delimiter)]
    pub delimiter: Option<u8>,
    /// Character encoding for input file (defaults to utf-8)
    #[arg(long = "input-encoding")]
    pub input_encoding: Option<String>,
}

pub fn parse_delimiter(value: &str) -> Result<u8, String> {
    match value {
        "tab" | "\t" => Ok(b'\t'),
        "comma" | "," => Ok(b','),
        "|" | "pipe" => Ok(b'|'),
        ";" | "semicolon" => Ok(b';'),
        other => {
            let mut chars = other.chars();
            let first = chars
                .next()
                .ok_or_else(|| "Delimiter cannot be empty".to_string())?;
            if chars.next().is_some() {
                return Err("Delimiter must be a single character".to_string());
            }
            if !first.is_ascii() {
                return Err("Delimiter must be ASCII".to_string());
            }
            Ok(first as u8)
        }
    }
}
