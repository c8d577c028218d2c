//! Duplicate collapsing: one row per identity, most complete row wins.

use std::collections::HashSet;

use anyhow::Result;
use log::info;

use crate::{
    cli::DedupArgs,
    error::ReconcileError,
    io_utils, normalize,
    table::{Cell, Table},
};

/// Collapses rows sharing the same identity tuple to the single row with the
/// most present fields; ties keep the earliest original row. Rows with any
/// absent identity cell are never merged with each other — partial key
/// equality proves nothing — so each survives as its own group.
pub fn collapse(table: &Table, identity_keys: &[String]) -> Result<Table, ReconcileError> {
    let missing = table.missing_columns(identity_keys.iter().map(String::as_str));
    if !missing.is_empty() {
        return Err(ReconcileError::schema_mismatch(missing));
    }
    let indices: Vec<usize> = identity_keys
        .iter()
        .filter_map(|name| table.column_index(name))
        .collect();

    // Stable sort by completeness keeps original order within equal counts,
    // so "first occurrence wins" is well defined.
    let mut order: Vec<usize> = (0..table.row_count()).collect();
    order.sort_by_key(|&idx| std::cmp::Reverse(Table::present_count(&table.rows()[idx])));

    let mut seen: HashSet<Vec<String>> = HashSet::new();
    let mut kept: Vec<Vec<Cell>> = Vec::new();
    for idx in order {
        let row = &table.rows()[idx];
        let identity: Option<Vec<String>> = indices
            .iter()
            .map(|col| row.get(*col).and_then(|cell| cell.clone()))
            .collect();
        match identity {
            Some(tuple) => {
                if seen.insert(tuple) {
                    kept.push(row.clone());
                }
            }
            None => kept.push(row.clone()),
        }
    }

    Ok(Table::with_rows(table.columns().to_vec(), kept))
}

pub fn execute(args: &DedupArgs) -> Result<()> {
    let delimiter = io_utils::resolve_input_delimiter(&args.input, args.delimiter);
    let encoding = io_utils::resolve_encoding(args.input_encoding.as_deref())?;
    let output_delimiter =
        io_utils::resolve_output_delimiter(args.output.as_deref(), args.output_delimiter, delimiter);

    let identity: Vec<String> = args
        .identity
        .iter()
        .map(|name| normalize::normalize_column_name(name))
        .collect();

    let table = io_utils::read_table(&args.input, delimiter, encoding)?;
    let table = normalize::normalize_headers(&table);
    let before = table.row_count();
    let collapsed = collapse(&table, &identity)?;

    io_utils::write_table(&collapsed, args.output.as_deref(), output_delimiter)?;
    info!(
        "Collapsed {} row(s) to {} unique identit(ies) from {:?}",
        before,
        collapsed.row_count(),
        args.input
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn identity() -> Vec<String> {
        vec!["first_name".into(), "last_name".into()]
    }

    #[test]
    fn keeps_the_most_complete_row_per_identity() {
        let table = Table::with_rows(
            vec![
                "first_name".into(),
                "last_name".into(),
                "email".into(),
                "phone_1".into(),
                "office_name".into(),
                "office_city".into(),
                "office_zip".into(),
            ],
            vec![
                vec![
                    Some("al".into()),
                    Some("lee".into()),
                    Some("al@x.com".into()),
                    Some("5551234567".into()),
                    Some("acme".into()),
                    None,
                    None,
                ],
                vec![
                    Some("al".into()),
                    Some("lee".into()),
                    Some("al@x.com".into()),
                    Some("5551234567".into()),
                    Some("acme".into()),
                    Some("springfield".into()),
                    Some("90210".into()),
                ],
            ],
        );
        let collapsed = collapse(&table, &identity()).unwrap();
        assert_eq!(collapsed.row_count(), 1);
        assert_eq!(collapsed.rows()[0][5].as_deref(), Some("springfield"));
    }

    #[test]
    fn equal_completeness_keeps_the_first_row() {
        let table = Table::with_rows(
            vec!["first_name".into(), "last_name".into(), "email".into()],
            vec![
                vec![
                    Some("al".into()),
                    Some("lee".into()),
                    Some("first@x.com".into()),
                ],
                vec![
                    Some("al".into()),
                    Some("lee".into()),
                    Some("second@x.com".into()),
                ],
            ],
        );
        let collapsed = collapse(&table, &identity()).unwrap();
        assert_eq!(collapsed.row_count(), 1);
        assert_eq!(collapsed.rows()[0][2].as_deref(), Some("first@x.com"));
    }

    #[test]
    fn absent_identity_cells_form_singleton_groups() {
        let table = Table::with_rows(
            vec!["first_name".into(), "last_name".into(), "email".into()],
            vec![
                vec![Some("al".into()), None, Some("a@x.com".into())],
                vec![Some("al".into()), None, Some("b@x.com".into())],
                vec![None, None, None],
            ],
        );
        let collapsed = collapse(&table, &identity()).unwrap();
        assert_eq!(collapsed.row_count(), 3);
    }

    #[test]
    fn distinct_identities_all_survive() {
        let table = Table::with_rows(
            vec!["first_name".into(), "last_name".into()],
            vec![
                vec![Some("al".into()), Some("lee".into())],
                vec![Some("bo".into()), Some("fox".into())],
            ],
        );
        let collapsed = collapse(&table, &identity()).unwrap();
        assert_eq!(collapsed.row_count(), 2);
    }

    #[test]
    fn unknown_identity_column_is_a_schema_mismatch() {
        let table = Table::new(vec!["first_name".into()]);
        let err = collapse(&table, &identity()).unwrap_err();
        assert_eq!(err.to_string(), "missing required column(s): last_name");
    }
}
