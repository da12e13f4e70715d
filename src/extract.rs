//! Extract command: dump a field range as CSV on stdout.

use anyhow::{Context, Result, bail};
use tracing::{info, info_span};

use clio_store::{ArrayStore, NetCdfStore};

use crate::cli::ExtractArgs;

/// Print `index, v_0, v_1, ...` rows for the requested range.
pub fn run(args: ExtractArgs) -> Result<()> {
    let _cmd = info_span!("extract").entered();

    let store = NetCdfStore::append(&args.input)
        .with_context(|| format!("failed to open output file: {}", args.input.display()))?;

    let rows = store.len(&args.field);
    if rows == 0 {
        bail!("field '{}' is empty or missing", args.field);
    }
    if args.start >= rows {
        bail!(
            "start index {} past the end of field '{}' ({} rows)",
            args.start,
            args.field,
            rows
        );
    }
    let count = args.count.unwrap_or(rows - args.start);

    info!(field = %args.field, start = args.start, count, "extracting range");
    let block = store
        .read_rows(&args.field, args.start, count)
        .with_context(|| format!("failed to read field '{}'", args.field))?;

    let width = block.ncols();
    let mut header = String::from("index");
    for c in 0..width {
        header.push_str(&format!(",v{c}"));
    }
    println!("{header}");

    for (i, row) in block.rows().into_iter().enumerate() {
        let mut line = format!("{}", args.start + i);
        for v in row {
            line.push_str(&format!(",{v}"));
        }
        println!("{line}");
    }

    Ok(())
}
