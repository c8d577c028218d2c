//! Normalizer: header canonicalization, value casing, phone cleaning, and
//! pattern validation.
//!
//! Casing has two distinct output modes. [`fold_values`] lowercases for
//! matching; [`title_case_values`] title-cases for display. A pipeline picks
//! exactly one; they are never combined.

use anyhow::Result;
use log::info;

use crate::{
    cli::{CasePolicy, CleanArgs, NormalizeArgs},
    io_utils,
    schema::{CompiledRules, RoleMap, ValidationRules},
    table::Table,
    transform::string_ops,
};

/// Canonical column name: trimmed, lowercased, `.` stripped, spaces to `_`,
/// so `"Alt. Zip"` becomes `"alt_zip"`. Applied exactly once, before any key
/// comparison.
pub fn normalize_column_name(name: &str) -> String {
    name.trim().to_lowercase().replace('.', "").replace(' ', "_")
}

pub fn normalize_headers(table: &Table) -> Table {
    let columns = table
        .columns()
        .iter()
        .map(|name| normalize_column_name(name))
        .collect();
    Table::with_rows(columns, table.rows().to_vec())
}

/// Lowercase-for-matching mode: trims and case-folds every present cell;
/// cells that trim to nothing become absent.
pub fn fold_values(table: &Table) -> Table {
    table.map_cells(|_, cell| {
        cell.and_then(|value| {
            let folded = string_ops::fold(value);
            if folded.is_empty() {
                None
            } else {
                Some(folded.into_owned())
            }
        })
    })
}

/// Title-case-for-display mode.
pub fn title_case_values(table: &Table) -> Table {
    table.map_cells(|_, cell| cell.map(|value| string_ops::title_case(value).into_owned()))
}

pub fn apply_casing(table: &Table, casing: CasePolicy) -> Table {
    match casing {
        CasePolicy::Fold => fold_values(table),
        CasePolicy::Title => title_case_values(table),
    }
}

/// Reduces each listed phone column to exactly 10 digits or absent: float
/// round-trip noise is truncated, formatting characters are stripped, and
/// anything other than a 10-digit result is blanked.
pub fn clean_phones(table: &Table, phone_columns: &[String]) -> Table {
    table.map_cells(|name, cell| {
        if !phone_columns.iter().any(|column| column == name) {
            return cell.map(str::to_string);
        }
        cell.and_then(|value| {
            let digits = string_ops::digits(string_ops::strip_float_artifact(value));
            if digits.len() == 10 {
                Some(digits.into_owned())
            } else {
                None
            }
        })
    })
}

/// Blanks values that fail their column's pattern; columns without a rule
/// pass through untouched.
pub fn validate_values(table: &Table, rules: &CompiledRules) -> Table {
    table.map_cells(|name, cell| {
        cell.and_then(|value| {
            match rules.pattern_for(name) {
                Some(pattern) if !pattern.is_match(value) => None,
                _ => Some(value.to_string()),
            }
        })
    })
}

/// Strict mode: drops every column without a rule, then validates the rest.
pub fn validate_and_clean(table: &Table, rules: &CompiledRules) -> Result<Table> {
    let kept: Vec<String> = table
        .columns()
        .iter()
        .filter(|name| rules.has_rule(name))
        .cloned()
        .collect();
    let projected = table.project(&kept)?;
    Ok(validate_values(&projected, rules))
}

pub fn execute_normalize(args: &NormalizeArgs) -> Result<()> {
    let delimiter = io_utils::resolve_input_delimiter(&args.input, args.delimiter);
    let encoding = io_utils::resolve_encoding(args.input_encoding.as_deref())?;
    let output_delimiter =
        io_utils::resolve_output_delimiter(args.output.as_deref(), args.output_delimiter, delimiter);

    let table = io_utils::read_table(&args.input, delimiter, encoding)?;
    let mut table = normalize_headers(&table);
    table = apply_casing(&table, args.casing);
    if !args.no_phones {
        let phone_columns = if args.phones.is_empty() {
            let roles = match &args.roles {
                Some(path) => RoleMap::load(path)?,
                None => RoleMap::contact_defaults(),
            };
            roles.phone_columns_in(&table)
        } else {
            args.phones
                .iter()
                .map(|name| normalize_column_name(name))
                .collect()
        };
        table = clean_phones(&table, &phone_columns);
    }

    io_utils::write_table(&table, args.output.as_deref(), output_delimiter)?;
    info!(
        "Normalized {} row(s) across {} column(s) from {:?}",
        table.row_count(),
        table.column_count(),
        args.input
    );
    Ok(())
}

pub fn execute_clean(args: &CleanArgs) -> Result<()> {
    let delimiter = io_utils::resolve_input_delimiter(&args.input, args.delimiter);
    let encoding = io_utils::resolve_encoding(args.input_encoding.as_deref())?;
    let output_delimiter =
        io_utils::resolve_output_delimiter(args.output.as_deref(), args.output_delimiter, delimiter);

    let rules = match &args.rules {
        Some(path) => ValidationRules::load(path)?,
        None => ValidationRules::contact_defaults(),
    };
    let compiled = rules.compile()?;

    let table = io_utils::read_table(&args.input, delimiter, encoding)?;
    let table = normalize_headers(&table);
    let dropped = table
        .columns()
        .iter()
        .filter(|name| !compiled.has_rule(name))
        .count();
    let cleaned = if args.keep_extra {
        validate_values(&table, &compiled)
    } else {
        validate_and_clean(&table, &compiled)?
    };

    io_utils::write_table(&cleaned, args.output.as_deref(), output_delimiter)?;
    if !args.keep_extra && dropped > 0 {
        info!("Dropped {dropped} column(s) without validation rules");
    }
    info!(
        "Validated {} row(s) across {} column(s) from {:?}",
        cleaned.row_count(),
        cleaned.column_count(),
        args.input
    );
    Ok(())
}
