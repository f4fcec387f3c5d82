use std::io::{self, Write};

use anyhow::{Context, Result, anyhow};
use recipe_eval::error::SubmitError;
use recipe_eval::navigation::Cursor;
use recipe_eval::progress::completed_ids;
use recipe_eval::submission::{EvaluationDraft, SubmissionRecorder, VersionDraft};
use tracing::warn;

use crate::cli::{SubmitArgs, error_tags};
use crate::commands::context::StudyContext;

pub fn run(args: SubmitArgs) -> Result<()> {
    let context = StudyContext::open(&args.study)?;
    let pairs = context.load_pairs()?;
    let position = pairs
        .iter()
        .position(|pair| pair.id == args.sample_id)
        .with_context(|| format!("sample #{} is not in the dataset", args.sample_id))?;
    let pair = &pairs[position];

    let store = context.evaluation_store()?;
    let completed = completed_ids(store.as_ref(), context.annotator_filter())
        .with_context(|| format!("failed to read evaluations from {}", store.location()))?;
    if completed.contains(&pair.id) {
        warn!(
            sample_id = pair.id,
            "sample already evaluated; this submission adds a second row"
        );
    }

    let mut draft = EvaluationDraft::new(pair.id, pair.title.clone());
    draft.annotator = context.annotator_filter().map(ToOwned::to_owned);
    draft.pref_ingredients = args.pref_ingredients.map(Into::into);
    draft.pref_numbers = args.pref_numbers.map(Into::into);
    draft.pref_procedure = args.pref_procedure.map(Into::into);
    draft.pref_overall = args.pref_overall.map(Into::into);
    draft.version_a = VersionDraft {
        cookable: args.a_cookable.into(),
        trust: args.a_trust,
        errors: error_tags(&args.a_errors),
    };
    draft.version_b = VersionDraft {
        cookable: args.b_cookable.into(),
        trust: args.b_trust,
        errors: error_tags(&args.b_errors),
    };
    draft.notes = args.notes;

    let recorder = SubmissionRecorder::new(store.as_ref(), context.layout());
    let record = match recorder.submit(draft) {
        Ok(record) => record,
        Err(SubmitError::Validation(err)) => {
            eprintln!("Please fill in all comparison fields:");
            for problem in &err.problems {
                eprintln!("  - {problem}");
            }
            return Err(anyhow!(err));
        }
        Err(SubmitError::Store(err)) => {
            return Err(err).with_context(|| format!("failed to save sample #{}", pair.id));
        }
    };

    let mut output = io::BufWriter::new(io::stdout().lock());
    writeln!(output, "Saved evaluation for sample #{}.", record.sample_id)?;

    let mut cursor = Cursor::at(position, pairs.len())
        .with_context(|| format!("position {position} outside dataset"))?;
    if cursor.next() {
        let next = &pairs[cursor.position()];
        writeln!(output, "Next: #{} {}", next.id, next.title)?;
    } else {
        writeln!(output, "That was the last sample.")?;
    }
    output.flush()?;

    Ok(())
}
