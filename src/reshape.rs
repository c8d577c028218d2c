//! Reshaper: unfolds wide phone slots into one row per phone number.

use anyhow::Result;
use log::info;

use crate::{
    cli::MeltArgs,
    io_utils, normalize,
    schema::{self, PHONE, PHONE_SLOT, PHONE_SLOTS},
    table::{Cell, Table},
};

/// Unfolds each present phone slot column into its own row: every output row
/// carries all non-phone columns unchanged plus a `phone_slot` label and a
/// `phone` value. The unfold is complete — absent slots still produce a row
/// with an absent phone — and callers filter as needed. `phone_N_type`
/// partner columns are consumed by the unfold, not copied through.
pub fn melt_phones(table: &Table) -> Table {
    let slots: Vec<&str> = PHONE_SLOTS
        .iter()
        .copied()
        .filter(|slot| table.has_column(slot))
        .collect();
    let consumed: Vec<String> = slots
        .iter()
        .flat_map(|slot| [slot.to_string(), schema::slot_type_column(slot)])
        .collect();

    let id_columns: Vec<String> = table
        .columns()
        .iter()
        .filter(|name| !consumed.contains(name))
        .cloned()
        .collect();
    let id_indices: Vec<usize> = id_columns
        .iter()
        .filter_map(|name| table.column_index(name))
        .collect();
    let slot_indices: Vec<(usize, &str)> = slots
        .iter()
        .filter_map(|slot| table.column_index(slot).map(|idx| (idx, *slot)))
        .collect();

    let mut columns = id_columns;
    columns.push(PHONE_SLOT.to_string());
    columns.push(PHONE.to_string());

    let mut melted = Table::new(columns);
    for row in table.rows() {
        for (slot_idx, slot_name) in &slot_indices {
            let mut out: Vec<Cell> = id_indices.iter().map(|idx| row[*idx].clone()).collect();
            out.push(Some(slot_name.to_string()));
            out.push(row[*slot_idx].clone());
            melted.push_row(out);
        }
    }
    melted
}

/// Drops melted rows whose `phone` cell is absent.
pub fn drop_absent_phones(table: &Table) -> Table {
    let Some(phone_idx) = table.column_index(PHONE) else {
        return table.clone();
    };
    let rows = table
        .rows()
        .iter()
        .filter(|row| row[phone_idx].is_some())
        .cloned()
        .collect();
    Table::with_rows(table.columns().to_vec(), rows)
}

pub fn execute(args: &MeltArgs) -> Result<()> {
    let delimiter = io_utils::resolve_input_delimiter(&args.input, args.delimiter);
    let encoding = io_utils::resolve_encoding(args.input_encoding.as_deref())?;
    let output_delimiter =
        io_utils::resolve_output_delimiter(args.output.as_deref(), args.output_delimiter, delimiter);

    let table = io_utils::read_table(&args.input, delimiter, encoding)?;
    let table = normalize::normalize_headers(&table);
    let mut melted = melt_phones(&table);
    if args.drop_empty {
        melted = drop_absent_phones(&melted);
    }

    io_utils::write_table(&melted, args.output.as_deref(), output_delimiter)?;
    info!(
        "Unfolded {} row(s) into {} phone row(s) from {:?}",
        table.row_count(),
        melted.row_count(),
        args.input
    );
    Ok(())
}
