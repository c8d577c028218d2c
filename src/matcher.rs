//! Cross-match engine: multi-key exact-join record linkage.
//!
//! One configurable engine replaces the per-key matcher variants of the
//! original system. Each requested key performs an independent exact inner
//! join between the input and (possibly melted) reference tables; the joins
//! are unioned so a record matches via *any* available signal, then exact
//! duplicates are removed and duplicate identities collapse to their most
//! complete row. Joins are hash lookups keyed on value tuples, so each key
//! costs one pass over both tables.

use std::collections::HashMap;

use anyhow::Result;
use itertools::Itertools;
use log::info;

use crate::{
    cli::{CasePolicy, MatchArgs, MatchKey},
    dedupe,
    error::ReconcileError,
    io_utils, normalize, reshape,
    schema::{AGENT_ID, EMAIL, FIRST_NAME, LAST_NAME, OFFICE_ID, PHONE, PHONE_SLOT, PHONE_SLOTS, RoleMap},
    table::{Cell, Table},
    transform::string_ops,
};

impl MatchKey {
    /// Columns this key joins on, as found in the input table.
    pub fn input_columns(self) -> &'static [&'static str] {
        match self {
            MatchKey::Name => &[FIRST_NAME, LAST_NAME],
            MatchKey::Phone => &[PHONE],
            MatchKey::Email => &[EMAIL],
            MatchKey::AgentId => &[AGENT_ID],
            MatchKey::OfficeId => &[OFFICE_ID],
        }
    }

    /// Columns this key requires of the raw reference table. Phone matching
    /// needs the wide slots, which the engine melts before joining.
    pub fn reference_columns(self) -> &'static [&'static str] {
        match self {
            MatchKey::Phone => &PHONE_SLOTS,
            other => other.input_columns(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct MatchOptions {
    /// Keys whose joins are unioned; a record matches via any of them.
    pub keys: Vec<MatchKey>,
    /// Identity columns for the final duplicate collapse.
    pub identity: Vec<String>,
    /// Casing applied to the returned table.
    pub casing: CasePolicy,
    /// Input-only columns carried into the output.
    pub retain: Vec<String>,
}

impl MatchOptions {
    pub fn new(keys: Vec<MatchKey>) -> Self {
        MatchOptions {
            keys,
            identity: vec![FIRST_NAME.to_string(), LAST_NAME.to_string()],
            casing: CasePolicy::Fold,
            retain: Vec::new(),
        }
    }

    pub fn with_casing(mut self, casing: CasePolicy) -> Self {
        self.casing = casing;
        self
    }
}

/// Returns the reference records that match at least one input record via
/// any requested key. Both tables must already be normalized (headers and
/// value casing); comparisons are exact.
///
/// Fails with `SchemaMismatch` before any joining if either table lacks a
/// required column. Zero matches is an `Ok` empty table carrying the full
/// output schema.
pub fn cross_match(
    input: &Table,
    reference: &Table,
    options: &MatchOptions,
) -> Result<Table, ReconcileError> {
    if options.keys.is_empty() {
        return Err(ReconcileError::schema_mismatch(["match key"]));
    }

    let keys: Vec<MatchKey> = options.keys.iter().copied().unique().collect();
    let mut missing: Vec<String> = Vec::new();
    for key in &keys {
        missing.extend(input.missing_columns(key.input_columns().iter().copied()));
        missing.extend(reference.missing_columns(key.reference_columns().iter().copied()));
    }
    missing.extend(input.missing_columns(options.retain.iter().map(String::as_str)));
    if !missing.is_empty() {
        return Err(ReconcileError::schema_mismatch(missing));
    }

    // Phone joins need one row per phone; rows whose slot was empty cannot
    // match and are dropped here, while the unfold's slot label never
    // reaches the output schema.
    let reference_work = if keys.contains(&MatchKey::Phone) {
        let melted = reshape::melt_phones(reference);
        let without_label: Vec<String> = melted
            .columns()
            .iter()
            .filter(|name| name.as_str() != PHONE_SLOT)
            .cloned()
            .collect();
        let projected = melted.project(&without_label)?;
        unique_rows(reshape::drop_absent_phones(&projected))
    } else {
        reference.clone()
    };

    let retained: Vec<String> = options
        .retain
        .iter()
        .filter(|name| !reference_work.has_column(name))
        .cloned()
        .collect();
    let retained_indices: Vec<usize> = retained
        .iter()
        .filter_map(|name| input.column_index(name))
        .collect();
    let mut output_columns = reference_work.columns().to_vec();
    output_columns.extend(retained.iter().cloned());

    let mut matched: Vec<Vec<Cell>> = Vec::new();
    for key in &keys {
        let input_indices: Vec<usize> = key
            .input_columns()
            .iter()
            .filter_map(|name| input.column_index(name))
            .collect();
        let reference_indices: Vec<usize> = key
            .input_columns()
            .iter()
            .filter_map(|name| reference_work.column_index(name))
            .collect();
        if reference_indices.len() != key.input_columns().len() {
            // Unreachable for validated keys: the melted layout always
            // carries `phone` and every other key column survives the melt.
            return Err(ReconcileError::schema_mismatch(
                key.input_columns().iter().copied(),
            ));
        }

        let mut lookup: HashMap<Vec<String>, Vec<usize>> = HashMap::new();
        for (row_idx, row) in input.rows().iter().enumerate() {
            if let Some(tuple) = key_tuple(row, &input_indices) {
                lookup.entry(tuple).or_default().push(row_idx);
            }
        }

        for row in reference_work.rows() {
            let Some(tuple) = key_tuple(row, &reference_indices) else {
                continue;
            };
            let Some(input_rows) = lookup.get(&tuple) else {
                continue;
            };
            for &input_idx in input_rows {
                let mut out = row.clone();
                for &retain_idx in &retained_indices {
                    out.push(input.rows()[input_idx][retain_idx].clone());
                }
                matched.push(out);
            }
        }
    }

    let unique: Vec<Vec<Cell>> = matched.into_iter().unique().collect();
    let result = Table::with_rows(output_columns, unique);
    let collapsed = dedupe::collapse(&result, &options.identity)?;
    Ok(normalize::apply_casing(&collapsed, options.casing))
}

/// The row's values at `indices`, or `None` when any of them is absent —
/// absent keys never participate in a join.
fn key_tuple(row: &[Cell], indices: &[usize]) -> Option<Vec<String>> {
    indices
        .iter()
        .map(|idx| row.get(*idx).and_then(|cell| cell.clone()))
        .collect()
}

fn unique_rows(table: Table) -> Table {
    let rows: Vec<Vec<Cell>> = table.rows().iter().cloned().unique().collect();
    Table::with_rows(table.columns().to_vec(), rows)
}

pub fn execute(args: &MatchArgs) -> Result<()> {
    let input_delimiter = io_utils::resolve_input_delimiter(&args.input, args.delimiter);
    let reference_delimiter = io_utils::resolve_input_delimiter(&args.reference, args.delimiter);
    let input_encoding = io_utils::resolve_encoding(args.input_encoding.as_deref())?;
    let reference_encoding = io_utils::resolve_encoding(args.reference_encoding.as_deref())?;

    let roles = RoleMap::contact_defaults();
    let input = load_for_matching(&args.input, input_delimiter, input_encoding, &roles)?;
    let reference = load_for_matching(
        &args.reference,
        reference_delimiter,
        reference_encoding,
        &roles,
    )?;

    let options = MatchOptions {
        keys: args.keys.clone(),
        identity: args
            .identity
            .iter()
            .map(|name| normalize::normalize_column_name(name))
            .collect(),
        casing: args.casing,
        retain: args
            .retain
            .iter()
            .map(|name| normalize::normalize_column_name(name))
            .collect(),
    };

    let matched = cross_match(&input, &reference, &options)?;
    if matched.is_empty() {
        info!("No matching records found");
    }

    if args.json {
        write_json(&matched, args.output.as_deref())?;
    } else {
        let output_delimiter =
            io_utils::resolve_output_delimiter(args.output.as_deref(), None, input_delimiter);
        let printable = match args.casing {
            CasePolicy::Title => display_headers(&matched),
            CasePolicy::Fold => matched.clone(),
        };
        io_utils::write_table(&printable, args.output.as_deref(), output_delimiter)?;
    }
    info!(
        "Matched {} unique record(s) against {:?}",
        matched.row_count(),
        args.reference
    );
    Ok(())
}

/// Normalizes a freshly loaded table the way every matching pipeline does:
/// canonical headers, folded values, phones reduced to ten digits or absent.
fn load_for_matching(
    path: &std::path::Path,
    delimiter: u8,
    encoding: &'static encoding_rs::Encoding,
    roles: &RoleMap,
) -> Result<Table> {
    let table = io_utils::read_table(path, delimiter, encoding)?;
    let table = normalize::normalize_headers(&table);
    let table = normalize::fold_values(&table);
    let phone_columns = roles.phone_columns_in(&table);
    Ok(normalize::clean_phones(&table, &phone_columns))
}

fn display_headers(table: &Table) -> Table {
    let columns = table
        .columns()
        .iter()
        .map(|name| string_ops::display_header(name))
        .collect();
    Table::with_rows(columns, table.rows().to_vec())
}

fn write_json(table: &Table, path: Option<&std::path::Path>) -> Result<()> {
    use anyhow::Context;
    use std::io::Write;

    let records = table.to_json_records();
    let rendered = serde_json::to_string_pretty(&records).context("Serializing matched records")?;
    match path {
        Some(p) if !io_utils::is_dash(p) => {
            std::fs::write(p, rendered.as_bytes())
                .with_context(|| format!("Writing JSON output to {p:?}"))?;
        }
        _ => {
            let mut stdout = std::io::stdout();
            stdout
                .write_all(rendered.as_bytes())
                .context("Writing JSON output")?;
            stdout.write_all(b"\n").context("Writing JSON output")?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input_table() -> Table {
        Table::with_rows(
            vec![
                "first_name".into(),
                "last_name".into(),
                "email".into(),
                "office_name".into(),
                "phone".into(),
            ],
            vec![
                vec![
                    Some("jane".into()),
                    Some("doe".into()),
                    Some("jane@x.com".into()),
                    Some("acme".into()),
                    Some("5551234567".into()),
                ],
                vec![
                    Some("bo".into()),
                    Some("fox".into()),
                    None,
                    Some("acme".into()),
                    Some("5550001111".into()),
                ],
            ],
        )
    }

    fn reference_table() -> Table {
        Table::with_rows(
            vec![
                "agent_id".into(),
                "first_name".into(),
                "last_name".into(),
                "office_id".into(),
                "phone_1".into(),
                "phone_2".into(),
                "phone_3".into(),
                "email".into(),
            ],
            vec![
                // Matches jane by name, not phone or email.
                vec![
                    Some("a1".into()),
                    Some("jane".into()),
                    Some("doe".into()),
                    Some("o1".into()),
                    Some("5552223333".into()),
                    None,
                    None,
                    None,
                ],
                // Matches bo by phone only (different spelling of the name).
                vec![
                    Some("a2".into()),
                    Some("robert".into()),
                    Some("fox".into()),
                    Some("o1".into()),
                    None,
                    Some("5550001111".into()),
                    None,
                    None,
                ],
                // Matches nothing.
                vec![
                    Some("a3".into()),
                    Some("zoe".into()),
                    Some("kim".into()),
                    Some("o2".into()),
                    Some("5559990000".into()),
                    None,
                    None,
                    Some("zoe@x.com".into()),
                ],
            ],
        )
    }

    #[test]
    fn union_semantics_accept_any_matching_key() {
        let options = MatchOptions::new(vec![MatchKey::Name, MatchKey::Phone]);
        let matched = cross_match(&input_table(), &reference_table(), &options).unwrap();
        let agents: Vec<&str> = matched
            .rows()
            .iter()
            .map(|row| row[0].as_deref().unwrap())
            .sorted()
            .collect();
        assert_eq!(agents, ["a1", "a2"]);
    }

    #[test]
    fn matched_rows_share_a_key_value_with_the_input() {
        let options = MatchOptions::new(vec![MatchKey::Name, MatchKey::Phone]);
        let matched = cross_match(&input_table(), &reference_table(), &options).unwrap();
        let phone_idx = matched.column_index(PHONE).unwrap();
        let first_idx = matched.column_index(FIRST_NAME).unwrap();
        let last_idx = matched.column_index(LAST_NAME).unwrap();
        for row in matched.rows() {
            let name_matches = input_table().rows().iter().any(|input_row| {
                input_row[0] == row[first_idx] && input_row[1] == row[last_idx]
            });
            let phone_matches = input_table()
                .rows()
                .iter()
                .any(|input_row| input_row[4] == row[phone_idx] && row[phone_idx].is_some());
            assert!(name_matches || phone_matches, "spurious row: {row:?}");
        }
    }

    #[test]
    fn phone_join_ignores_absent_slots() {
        let reference = Table::with_rows(
            vec![
                "first_name".into(),
                "last_name".into(),
                "phone_1".into(),
                "phone_2".into(),
                "phone_3".into(),
            ],
            vec![vec![
                Some("ann".into()),
                Some("wu".into()),
                None,
                None,
                None,
            ]],
        );
        let input = Table::with_rows(
            vec!["first_name".into(), "last_name".into(), "phone".into()],
            vec![vec![Some("ann".into()), Some("wu".into()), None]],
        );
        let options = MatchOptions::new(vec![MatchKey::Phone]);
        let matched = cross_match(&input, &reference, &options).unwrap();
        assert!(matched.is_empty());
    }

    #[test]
    fn missing_reference_columns_fail_before_joining() {
        let reference = Table::new(vec!["first_name".into(), "last_name".into()]);
        let options = MatchOptions::new(vec![MatchKey::Phone, MatchKey::Email]);
        let err = cross_match(&input_table(), &reference, &options).unwrap_err();
        assert_eq!(
            err.to_string(),
            "missing required column(s): email, phone_1, phone_2, phone_3"
        );
    }

    #[test]
    fn empty_key_set_is_rejected() {
        let options = MatchOptions::new(Vec::new());
        let err = cross_match(&input_table(), &reference_table(), &options).unwrap_err();
        assert!(matches!(err, ReconcileError::SchemaMismatch { .. }));
    }

    #[test]
    fn no_matches_is_an_empty_table_not_an_error() {
        let input = Table::with_rows(
            vec![
                "first_name".into(),
                "last_name".into(),
                "email".into(),
                "phone".into(),
            ],
            vec![vec![
                Some("nobody".into()),
                Some("here".into()),
                Some("n@h.com".into()),
                Some("5557654321".into()),
            ]],
        );
        let options = MatchOptions::new(vec![MatchKey::Name, MatchKey::Email]);
        let matched = cross_match(&input, &reference_table(), &options).unwrap();
        assert!(matched.is_empty());
        assert!(matched.has_column("agent_id"));
    }

    #[test]
    fn duplicate_identities_collapse_to_the_most_complete_row() {
        let reference = Table::with_rows(
            vec![
                "first_name".into(),
                "last_name".into(),
                "email".into(),
                "office_id".into(),
            ],
            vec![
                vec![Some("jane".into()), Some("doe".into()), None, None],
                vec![
                    Some("jane".into()),
                    Some("doe".into()),
                    Some("jane@x.com".into()),
                    Some("o1".into()),
                ],
            ],
        );
        let options = MatchOptions::new(vec![MatchKey::Name]);
        let matched = cross_match(&input_table(), &reference, &options).unwrap();
        assert_eq!(matched.row_count(), 1);
        assert_eq!(matched.rows()[0][2].as_deref(), Some("jane@x.com"));
    }

    #[test]
    fn retained_input_columns_are_appended() {
        let mut options = MatchOptions::new(vec![MatchKey::Name]);
        options.retain = vec!["office_name".into()];
        let matched = cross_match(&input_table(), &reference_table(), &options).unwrap();
        let office_idx = matched.column_index("office_name").unwrap();
        assert_eq!(matched.rows()[0][office_idx].as_deref(), Some("acme"));
    }

    #[test]
    fn title_casing_applies_to_the_returned_values() {
        let options =
            MatchOptions::new(vec![MatchKey::Name]).with_casing(CasePolicy::Title);
        let matched = cross_match(&input_table(), &reference_table(), &options).unwrap();
        let first_idx = matched.column_index(FIRST_NAME).unwrap();
        assert_eq!(matched.rows()[0][first_idx].as_deref(), Some("Jane"));
    }
}
