use std::io::{self, Write};

use anyhow::{Context, Result};
use recipe_eval::submission::load_records;
use tracing::info;

use crate::cli::ExportArgs;
use crate::commands::context::StudyContext;

pub fn run(args: ExportArgs) -> Result<()> {
    let context = StudyContext::open(&args.study)?;
    let store = context.evaluation_store()?;
    let records = load_records(store.as_ref(), context.annotator_filter())
        .with_context(|| format!("failed to load evaluations from {}", store.location()))?;

    let mut output = io::BufWriter::new(io::stdout().lock());
    for record in &records {
        serde_json::to_writer(&mut output, record).context("failed to serialize evaluation")?;
        writeln!(output)?;
    }
    output.flush()?;

    info!(store = %store.location(), records = records.len(), "exported evaluations");
    Ok(())
}
