//! Inspect command: summarize the fields of a persisted output file.

use anyhow::{Context, Result};
use tracing::{info, info_span};

use clio_store::{ArrayStore, NetCdfStore};

use crate::cli::InspectArgs;

/// Print one line per field: name, width, rows, and summary statistics.
pub fn run(args: InspectArgs) -> Result<()> {
    let _cmd = info_span!("inspect").entered();

    let store = NetCdfStore::append(&args.input)
        .with_context(|| format!("failed to open output file: {}", args.input.display()))?;

    let mut fields = store.fields();
    fields.sort_by(|a, b| a.name.cmp(&b.name));
    info!(path = %args.input.display(), n_fields = fields.len(), "output file opened");

    println!("{:<16} {:>8} {:>8} {:>12} {:>12} {:>12}", "field", "width", "rows", "min", "max", "mean");
    for spec in &fields {
        let rows = store.len(&spec.name);
        if rows == 0 {
            println!("{:<16} {:>8} {:>8} {:>12} {:>12} {:>12}", spec.name, spec.width, 0, "-", "-", "-");
            continue;
        }
        let block = store
            .read_rows(&spec.name, 0, rows)
            .with_context(|| format!("failed to read field '{}'", spec.name))?;

        let mut min = f64::INFINITY;
        let mut max = f64::NEG_INFINITY;
        let mut sum = 0.0;
        for &v in &block {
            min = min.min(v);
            max = max.max(v);
            sum += v;
        }
        let mean = sum / block.len() as f64;
        println!(
            "{:<16} {:>8} {:>8} {:>12.5} {:>12.5} {:>12.5}",
            spec.name, spec.width, rows, min, max, mean
        );
    }

    Ok(())
}
