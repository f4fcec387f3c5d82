use std::io::{self, Write};

use anyhow::{Context, Result, bail};
use recipe_eval::model::{BlindedPair, ParsedRecipe, SampleId, Slot};
use recipe_eval::navigation::Cursor;
use recipe_eval::progress::{ProgressSummary, completed_ids};
use serde::Serialize;

use crate::cli::ShowArgs;
use crate::commands::context::StudyContext;

#[derive(Debug, Serialize)]
struct ShowResponse<'a> {
    position: usize,
    progress: ProgressSummary,
    already_evaluated: bool,
    pair: &'a BlindedPair,
}

pub fn run(args: ShowArgs) -> Result<()> {
    let context = StudyContext::open(&args.study)?;
    let pairs = context.load_pairs()?;
    if pairs.is_empty() {
        bail!("no data found in {}", context.dataset_path().display());
    }

    let store = context.evaluation_store()?;
    let completed = completed_ids(store.as_ref(), context.annotator_filter())
        .with_context(|| format!("failed to read evaluations from {}", store.location()))?;
    let order: Vec<SampleId> = pairs.iter().map(|pair| pair.id).collect();
    let progress = ProgressSummary::new(&order, &completed);

    let mut cursor = Cursor::new(pairs.len());
    if args.next_pending {
        if !cursor.jump_to_first_pending(&order, &completed) {
            println!("All samples completed!");
            return Ok(());
        }
    } else if let Some(index) = args.index {
        if !cursor.jump(index) {
            bail!("index {index} is out of range (0..{})", pairs.len());
        }
    }

    let pair = &pairs[cursor.position()];
    let already_evaluated = completed.contains(&pair.id);

    let mut output = io::BufWriter::new(io::stdout().lock());
    if args.json {
        let response = ShowResponse {
            position: cursor.position(),
            progress,
            already_evaluated,
            pair,
        };
        serde_json::to_writer_pretty(&mut output, &response)
            .context("failed to serialize pair json output")?;
        writeln!(output)?;
    } else {
        write_pair(&mut output, pair, already_evaluated, progress)?;
    }
    output.flush()?;

    Ok(())
}

fn write_pair(
    output: &mut impl Write,
    pair: &BlindedPair,
    already_evaluated: bool,
    progress: ProgressSummary,
) -> Result<()> {
    writeln!(
        output,
        "Progress: {} / {} samples completed",
        progress.completed, progress.total
    )?;
    if already_evaluated {
        writeln!(
            output,
            "WARNING: sample #{} is already evaluated. Submitting again adds a duplicate entry.",
            pair.id
        )?;
    } else {
        writeln!(output, "Sample #{} - pending evaluation", pair.id)?;
    }
    writeln!(output)?;
    writeln!(output, "Recipe request: {}", pair.title)?;

    for slot in [Slot::A, Slot::B] {
        writeln!(output)?;
        writeln!(output, "=== Version {slot} ===")?;
        write_recipe(output, pair.slot(slot))?;
    }

    Ok(())
}

fn write_recipe(output: &mut impl Write, recipe: &ParsedRecipe) -> Result<()> {
    writeln!(output, "Ingredients:")?;
    for ingredient in recipe.ingredients() {
        writeln!(output, "  - {ingredient}")?;
    }
    writeln!(output, "Instructions:")?;
    for (step, instruction) in recipe.instructions().into_iter().enumerate() {
        writeln!(output, "  {}. {instruction}", step + 1)?;
    }
    Ok(())
}
