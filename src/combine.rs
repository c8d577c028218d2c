//! Aggregator: combines same-schema CSV files into one master table.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use log::{info, warn};

use crate::{
    cli::CombineArgs,
    io_utils, normalize,
    schema::{self, RoleMap},
    table::Table,
};

/// Concatenates labeled tables that carry at least `expected` columns,
/// projected to exactly that set and order. Non-conforming tables are
/// skipped with a warning naming what they lack; conforming rows keep their
/// source order. No dedupe happens here.
pub fn combine(tables: &[(String, Table)], expected: &[String]) -> Table {
    let mut combined = Table::new(expected.to_vec());
    for (label, table) in tables {
        let missing = table.missing_columns(expected.iter().map(String::as_str));
        if !missing.is_empty() {
            warn!(
                "Skipping {label}: missing expected column(s) {}",
                missing.join(", ")
            );
            continue;
        }
        match table.project(expected) {
            Ok(projected) => {
                for row in projected.rows() {
                    combined.push_row(row.clone());
                }
            }
            Err(err) => warn!("Skipping {label}: {err}"),
        }
    }
    combined
}

pub fn execute(args: &CombineArgs) -> Result<()> {
    let paths = gather_inputs(args)?;
    if paths.is_empty() {
        return Err(anyhow!("At least one input file or folder must be provided"));
    }

    let encoding = io_utils::resolve_encoding(args.input_encoding.as_deref())?;
    let expected: Vec<String> = if args.columns.is_empty() {
        schema::master_columns()
    } else {
        args.columns
            .iter()
            .map(|name| normalize::normalize_column_name(name))
            .collect()
    };
    let roles = RoleMap::contact_defaults();

    let mut tables: Vec<(String, Table)> = Vec::new();
    for path in &paths {
        let delimiter = io_utils::resolve_input_delimiter(path, args.delimiter);
        let table = match io_utils::read_table(path, delimiter, encoding) {
            Ok(table) => table,
            Err(err) => {
                warn!("Skipping {}: {err}", path.display());
                continue;
            }
        };
        let mut table = normalize::normalize_headers(&table);
        if args.clean_phones {
            let phone_columns = roles.phone_columns_in(&table);
            table = normalize::clean_phones(&table, &phone_columns);
        }
        tables.push((path.display().to_string(), table));
        info!("✓ Loaded {}", path.display());
    }

    let combined = combine(&tables, &expected);
    let output_delimiter = io_utils::resolve_output_delimiter(
        args.output.as_deref(),
        None,
        io_utils::DEFAULT_CSV_DELIMITER,
    );
    io_utils::write_table(&combined, args.output.as_deref(), output_delimiter)?;
    info!(
        "Combined {} file(s) into {} row(s)",
        tables.len(),
        combined.row_count()
    );
    Ok(())
}

/// Explicit inputs first, then each folder's `*.csv` files sorted by name.
fn gather_inputs(args: &CombineArgs) -> Result<Vec<PathBuf>> {
    let mut paths = args.inputs.clone();
    for dir in &args.dirs {
        paths.extend(csv_files_in(dir)?);
    }
    Ok(paths)
}

fn csv_files_in(dir: &Path) -> Result<Vec<PathBuf>> {
    let entries =
        std::fs::read_dir(dir).with_context(|| format!("Reading folder {}", dir.display()))?;
    let mut files: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| {
            path.is_file()
                && path
                    .extension()
                    .and_then(|ext| ext.to_str())
                    .is_some_and(|ext| ext.eq_ignore_ascii_case("csv"))
        })
        .collect();
    files.sort();
    Ok(files)
}
