use std::path::PathBuf;

use clap::{Parser, Subcommand};

use practitioner_lookup::constants::{DEFAULT_LOOKUP_BASE_URL, DEFAULT_PAGE_SIZE, DEFAULT_TIMEOUT_SECS};
use practitioner_lookup::present::SortDirection;
use practitioner_lookup::response::Column;
use practitioner_lookup::schema::{EndpointSelector, PractitionerRecord};

#[derive(Parser, Debug)]
#[command(name = "practitioner-lookup")]
#[command(about = "Batch practitioner (NPI) lookups against the directory service", long_about = None)]
pub struct Args {
    #[command(subcommand)]
    pub cmd: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Build one batch from flags, JSON or a file, submit it and print the results.
    Query(QueryArgs),
    /// Interactive session driven by commands on stdin (type `help`).
    Session(SessionArgs),
}

#[derive(clap::Args, Debug, Clone)]
pub struct ServiceArgs {
    /// Lookup service URL; endpoint, format and consensus are added as query parameters.
    #[arg(long, default_value = DEFAULT_LOOKUP_BASE_URL)]
    pub base_url: String,

    /// Per-request timeout.
    #[arg(long, default_value_t = DEFAULT_TIMEOUT_SECS)]
    pub timeout_secs: u64,

    /// Max retry attempts for 429/5xx answers and transport failures.
    #[arg(long, default_value_t = 0)]
    pub max_retries: u32,

    /// Rows per page in each result table.
    #[arg(long, default_value_t = DEFAULT_PAGE_SIZE)]
    pub page_size: usize,

    /// Disable row colours.
    #[arg(long, default_value_t = false)]
    pub no_color: bool,
}

#[derive(clap::Args, Debug, Clone)]
pub struct QueryArgs {
    #[command(flatten)]
    pub service: ServiceArgs,

    /// Practitioner as FIRST,LAST,NPI. Repeat for several.
    #[arg(long = "practitioner", value_parser = parse_practitioner, conflicts_with_all = ["json", "file"])]
    pub practitioners: Vec<PractitionerRecord>,

    /// Look the one --practitioner up on its own (GET with query parameters).
    #[arg(long, default_value_t = false, requires = "practitioners")]
    pub single: bool,

    /// Batch as JSON text: {"practitioners": [{"npi", "first_name", "last_name"}]}.
    #[arg(long, conflicts_with = "file")]
    pub json: Option<String>,

    /// CSV (first_name,last_name,npi header) or JSON file to load the batch from.
    #[arg(long)]
    pub file: Option<PathBuf>,

    /// MIME type of --file. Guessed from the extension when omitted.
    #[arg(long, requires = "file")]
    pub content_type: Option<String>,

    /// Source selector: All, Kaiser, Humana, Cigna, PacificSource or Centene.
    #[arg(long, default_value_t = EndpointSelector::All)]
    pub endpoint: EndpointSelector,

    /// Ask the service for a consensus row per practitioner.
    #[arg(long, default_value_t = true, action = clap::ArgAction::Set)]
    pub consensus: bool,

    /// Sort every result table by this column (header or wire name).
    #[arg(long)]
    pub sort_by: Option<Column>,

    /// Sort descending instead of ascending.
    #[arg(long, default_value_t = false, requires = "sort_by")]
    pub descending: bool,

    /// Also write the raw response to DIR/data.json.
    #[arg(long)]
    pub download_dir: Option<PathBuf>,

    /// Also write each result group as DIR/<key>.csv.
    #[arg(long)]
    pub export_csv_dir: Option<PathBuf>,
}

impl QueryArgs {
    pub fn sort(&self) -> Option<(Column, SortDirection)> {
        let direction = if self.descending {
            SortDirection::Descending
        } else {
            SortDirection::Ascending
        };
        self.sort_by.map(|column| (column, direction))
    }
}

#[derive(clap::Args, Debug, Clone)]
pub struct SessionArgs {
    #[command(flatten)]
    pub service: ServiceArgs,

    /// Directory `download` writes data.json into when no DIR is given.
    #[arg(long, default_value = ".")]
    pub download_dir: PathBuf,
}

fn parse_practitioner(value: &str) -> Result<PractitionerRecord, String> {
    let parts: Vec<&str> = value.split(',').map(str::trim).collect();
    match parts.as_slice() {
        [first, last, npi] => Ok(PractitionerRecord::new(*first, *last, *npi)),
        _ => Err(format!("expected FIRST,LAST,NPI, got {value:?}")),
    }
}
