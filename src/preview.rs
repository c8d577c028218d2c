use anyhow::Result;
use log::info;

use crate::{cli::PreviewArgs, io_utils};

pub fn execute(args: &PreviewArgs) -> Result<()> {
    let delimiter = io_utils::resolve_input_delimiter(&args.input, args.delimiter);
    let encoding = io_utils::resolve_encoding(args.input_encoding.as_deref())?;
    let table = io_utils::read_table(&args.input, delimiter, encoding)?;
    print!("{}", table.render(args.rows));
    info!(
        "Displayed {} row(s) from {:?}",
        table.row_count().min(args.rows),
        args.input
    );
    Ok(())
}
