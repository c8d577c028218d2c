//! Gap finder: candidate rows whose key tuple never appears in a primary
//! table.

use std::collections::HashSet;

use anyhow::Result;
use log::info;

use crate::{
    cli::MissingArgs,
    error::ReconcileError,
    io_utils, normalize,
    table::Table,
};

/// Returns every `candidate` row whose full tuple of `key_columns` values is
/// absent from `primary`'s projection onto the same columns. Comparison is
/// tuple-exact on normalized values; a candidate row with any absent key
/// cell is always reported missing, since absence cannot prove presence.
pub fn find_missing(
    primary: &Table,
    candidate: &Table,
    key_columns: &[String],
) -> Result<Table, ReconcileError> {
    let mut missing = primary.missing_columns(key_columns.iter().map(String::as_str));
    missing.extend(candidate.missing_columns(key_columns.iter().map(String::as_str)));
    if !missing.is_empty() {
        return Err(ReconcileError::schema_mismatch(missing));
    }

    let primary_indices: Vec<usize> = key_columns
        .iter()
        .filter_map(|name| primary.column_index(name))
        .collect();
    let candidate_indices: Vec<usize> = key_columns
        .iter()
        .filter_map(|name| candidate.column_index(name))
        .collect();

    let known: HashSet<Vec<String>> = primary
        .rows()
        .iter()
        .filter_map(|row| {
            primary_indices
                .iter()
                .map(|idx| row.get(*idx).and_then(|cell| cell.clone()))
                .collect()
        })
        .collect();

    let rows = candidate
        .rows()
        .iter()
        .filter(|row| {
            let tuple: Option<Vec<String>> = candidate_indices
                .iter()
                .map(|idx| row.get(*idx).and_then(|cell| cell.clone()))
                .collect();
            match tuple {
                Some(tuple) => !known.contains(&tuple),
                None => true,
            }
        })
        .cloned()
        .collect();

    Ok(Table::with_rows(candidate.columns().to_vec(), rows))
}

pub fn execute(args: &MissingArgs) -> Result<()> {
    let primary_delimiter = io_utils::resolve_input_delimiter(&args.primary, args.delimiter);
    let candidate_delimiter = io_utils::resolve_input_delimiter(&args.candidate, args.delimiter);
    let encoding = io_utils::resolve_encoding(args.input_encoding.as_deref())?;

    let keys: Vec<String> = args
        .keys
        .iter()
        .map(|name| normalize::normalize_column_name(name))
        .collect();

    let primary = io_utils::read_table(&args.primary, primary_delimiter, encoding)?;
    let primary = normalize::fold_values(&normalize::normalize_headers(&primary));
    let candidate = io_utils::read_table(&args.candidate, candidate_delimiter, encoding)?;
    let candidate = normalize::fold_values(&normalize::normalize_headers(&candidate));

    let absent = find_missing(&primary, &candidate, &keys)?;
    let output_delimiter = io_utils::resolve_output_delimiter(
        args.output.as_deref(),
        None,
        candidate_delimiter,
    );
    io_utils::write_table(&absent, args.output.as_deref(), output_delimiter)?;
    info!(
        "{} of {} candidate row(s) absent from {:?}",
        absent.row_count(),
        candidate.row_count(),
        args.primary
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keys() -> Vec<String> {
        vec!["first_name".into(), "last_name".into()]
    }

    fn name_table(names: &[(&str, &str)]) -> Table {
        Table::with_rows(
            vec!["first_name".into(), "last_name".into()],
            names
                .iter()
                .map(|(first, last)| vec![Some(first.to_string()), Some(last.to_string())])
                .collect(),
        )
    }

    #[test]
    fn reports_only_rows_absent_from_primary() {
        let primary = name_table(&[("al", "lee")]);
        let candidate = name_table(&[("al", "lee"), ("bo", "fox")]);
        let absent = find_missing(&primary, &candidate, &keys()).unwrap();
        assert_eq!(absent.row_count(), 1);
        assert_eq!(absent.rows()[0][0].as_deref(), Some("bo"));
    }

    #[test]
    fn absent_key_cells_are_always_reported_missing() {
        let primary = Table::with_rows(
            vec!["first_name".into(), "last_name".into()],
            vec![vec![Some("al".into()), None]],
        );
        let candidate = Table::with_rows(
            vec!["first_name".into(), "last_name".into()],
            vec![vec![Some("al".into()), None]],
        );
        let absent = find_missing(&primary, &candidate, &keys()).unwrap();
        assert_eq!(absent.row_count(), 1);
    }

    #[test]
    fn key_columns_must_exist_in_both_tables() {
        let primary = name_table(&[("al", "lee")]);
        let candidate = Table::new(vec!["first_name".into()]);
        let err = find_missing(&primary, &candidate, &keys()).unwrap_err();
        assert_eq!(err.to_string(), "missing required column(s): last_name");
    }

    #[test]
    fn full_tuple_must_match_not_just_one_column() {
        let primary = name_table(&[("al", "lee")]);
        let candidate = name_table(&[("al", "fox")]);
        let absent = find_missing(&primary, &candidate, &keys()).unwrap();
        assert_eq!(absent.row_count(), 1);
    }
}
