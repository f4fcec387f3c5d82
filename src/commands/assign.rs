use std::io::{self, Write};

use anyhow::Result;
use recipe_eval::util::sha256_file;
use tracing::info;

use crate::cli::AssignArgs;
use crate::commands::context::StudyContext;

pub fn run(args: AssignArgs) -> Result<()> {
    let context = StudyContext::open(&args.study)?;
    let samples = context.load_samples()?;
    let outcome = context.load_blinding(samples.len())?;

    let mapping_path = context.mapping_path();
    let digest = if mapping_path.exists() {
        Some(sha256_file(&mapping_path)?)
    } else {
        None
    };

    info!(
        path = %mapping_path.display(),
        samples = outcome.map.len(),
        generated = outcome.generated,
        "blinding mapping ready"
    );

    let mut output = io::BufWriter::new(io::stdout().lock());
    writeln!(output, "Mapping: {}", mapping_path.display())?;
    writeln!(
        output,
        "Samples: {} ({})",
        outcome.map.len(),
        if outcome.generated {
            "generated now"
        } else {
            "reused"
        }
    )?;
    match digest {
        Some(digest) => writeln!(output, "SHA-256: {digest}")?,
        None => writeln!(output, "SHA-256: - (no samples, nothing persisted)")?,
    }
    output.flush()?;

    Ok(())
}
