use std::io::{self, Write};

use anyhow::{Context, Result};
use recipe_eval::model::SampleId;
use recipe_eval::progress::{ProgressSummary, completed_ids, first_pending};
use recipe_eval::util::sha256_file;
use tracing::{info, warn};

use crate::cli::StatusArgs;
use crate::commands::context::StudyContext;

pub fn run(args: StatusArgs) -> Result<()> {
    let context = StudyContext::open(&args.study)?;
    let samples = context.load_samples()?;
    let store = context.evaluation_store()?;

    let completed = completed_ids(store.as_ref(), context.annotator_filter())
        .with_context(|| format!("failed to read evaluations from {}", store.location()))?;
    let order: Vec<SampleId> = samples.iter().map(|sample| sample.id).collect();
    let summary = ProgressSummary::new(&order, &completed);

    let mapping_path = context.mapping_path();
    if mapping_path.exists() {
        info!(
            path = %mapping_path.display(),
            sha256 = %sha256_file(&mapping_path)?,
            "blinding mapping present"
        );
    } else {
        warn!(path = %mapping_path.display(), "blinding mapping not generated yet");
    }

    let mut output = io::BufWriter::new(io::stdout().lock());
    writeln!(
        output,
        "{} / {} samples completed ({:.0}%)",
        summary.completed,
        summary.total,
        summary.fraction() * 100.0
    )?;

    match first_pending(&order, &completed) {
        Some(position) => writeln!(
            output,
            "Next pending: #{} {}",
            samples[position].id, samples[position].title
        )?,
        None if summary.total > 0 => writeln!(output, "All samples completed!")?,
        None => writeln!(output, "No data found.")?,
    }

    if args.list {
        writeln!(output)?;
        for sample in &samples {
            let marker = if completed.contains(&sample.id) {
                "[x]"
            } else {
                "[ ]"
            };
            writeln!(output, "{marker} {}: {}", sample.id, sample.title)?;
        }
    }
    output.flush()?;

    Ok(())
}
