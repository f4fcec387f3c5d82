use serde_json::Value;

use crate::blinding::BlindingMap;
use crate::error::BlindingError;
use crate::model::{BlindedPair, ParsedRecipe, RawField, Sample, Slot};

const INGREDIENTS_KEY: &str = "ingredients";
const INSTRUCTIONS_KEY: &str = "instructions";

/// Total parse of a raw recipe field; failures degrade to `ParseError`.
pub fn parse_recipe(raw: &RawField) -> ParsedRecipe {
    match raw {
        RawField::Structured(value) => recipe_from_value(value, || value.to_string()),
        RawField::Text(text) => match serde_json::from_str::<Value>(text) {
            Ok(value) => recipe_from_value(&value, || text.clone()),
            Err(_) => ParsedRecipe::ParseError {
                raw_text: text.clone(),
            },
        },
    }
}

fn recipe_from_value(value: &Value, raw_text: impl FnOnce() -> String) -> ParsedRecipe {
    match value {
        Value::Object(fields) => ParsedRecipe::Valid {
            ingredients: string_list(fields.get(INGREDIENTS_KEY)),
            instructions: string_list(fields.get(INSTRUCTIONS_KEY)),
        },
        _ => ParsedRecipe::ParseError {
            raw_text: raw_text(),
        },
    }
}

fn string_list(value: Option<&Value>) -> Vec<String> {
    match value {
        None | Some(Value::Null) => Vec::new(),
        Some(Value::Array(items)) => items.iter().map(value_text).collect(),
        Some(other) => vec![value_text(other)],
    }
}

fn value_text(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

pub fn blind_pair(sample: &Sample, mixed_is: Slot) -> BlindedPair {
    let cross_entropy = parse_recipe(&sample.cross_entropy_output);
    let mixed = parse_recipe(&sample.mixed_output);
    let (a, b) = match mixed_is {
        Slot::A => (mixed, cross_entropy),
        Slot::B => (cross_entropy, mixed),
    };

    BlindedPair {
        id: sample.id,
        title: sample.title.clone(),
        a,
        b,
    }
}

/// Blinded pairs in input order; sample ids are carried through untouched.
pub fn prepare(samples: &[Sample], mapping: &BlindingMap) -> Result<Vec<BlindedPair>, BlindingError> {
    samples
        .iter()
        .map(|sample| -> Result<BlindedPair, BlindingError> {
            let assignment = mapping
                .get(sample.id)
                .ok_or(BlindingError::Unassigned(sample.id))?;
            Ok(blind_pair(sample, assignment.mixed_is))
        })
        .collect()
}

pub fn parse_error_count(pairs: &[BlindedPair]) -> usize {
    pairs
        .iter()
        .map(|pair| usize::from(pair.a.is_parse_error()) + usize::from(pair.b.is_parse_error()))
        .sum()
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::blinding::SeededDraws;

    fn recipe_json(ingredient: &str, step: &str) -> String {
        json!({ "ingredients": [ingredient], "instructions": [step] }).to_string()
    }

    fn sample(id: u64, ce: &str, mixed: &str) -> Sample {
        Sample {
            id,
            title: format!("Recipe {id}"),
            cross_entropy_output: RawField::Text(ce.to_string()),
            mixed_output: RawField::Text(mixed.to_string()),
        }
    }

    #[test]
    fn parse_recipe_decodes_json_text() {
        let parsed = parse_recipe(&RawField::Text(recipe_json("2 eggs", "Whisk the eggs")));
        assert_eq!(
            parsed,
            ParsedRecipe::Valid {
                ingredients: vec!["2 eggs".to_string()],
                instructions: vec!["Whisk the eggs".to_string()],
            }
        );
    }

    #[test]
    fn parse_recipe_passes_structured_values_through() {
        let value = json!({ "ingredients": ["flour", 200], "instructions": "Mix." });
        let parsed = parse_recipe(&RawField::Structured(value));
        assert_eq!(
            parsed,
            ParsedRecipe::Valid {
                ingredients: vec!["flour".to_string(), "200".to_string()],
                instructions: vec!["Mix.".to_string()],
            }
        );
    }

    #[test]
    fn parse_recipe_degrades_on_invalid_json() {
        let parsed = parse_recipe(&RawField::Text("not json".to_string()));
        assert!(parsed.is_parse_error());
        assert_eq!(parsed.ingredients(), vec!["Parse Error"]);
        assert_eq!(parsed.instructions(), vec!["not json"]);
    }

    #[test]
    fn parse_recipe_degrades_on_non_object_json() {
        for raw in ["42", "[\"a\"]", "null", "\"just text\"", ""] {
            let parsed = parse_recipe(&RawField::Text(raw.to_string()));
            assert_eq!(
                parsed,
                ParsedRecipe::ParseError {
                    raw_text: raw.to_string()
                },
                "input {raw:?}"
            );
        }
    }

    #[test]
    fn parse_recipe_defaults_missing_sections_to_empty() {
        let parsed = parse_recipe(&RawField::Text("{\"ingredients\": [\"salt\"]}".to_string()));
        assert_eq!(parsed.ingredients(), vec!["salt"]);
        assert!(parsed.instructions().is_empty());
    }

    #[test]
    fn prepare_places_mixed_output_according_to_mapping() {
        let samples: Vec<Sample> = (0..8)
            .map(|id| {
                sample(
                    id,
                    &recipe_json("ce", &format!("ce step {id}")),
                    &recipe_json("mixed", &format!("mixed step {id}")),
                )
            })
            .collect();
        let mapping = BlindingMap::generate(samples.len(), &mut SeededDraws::new(42));

        let pairs = prepare(&samples, &mapping).expect("prepare");
        assert_eq!(pairs.len(), samples.len());

        for (pair, sample) in pairs.iter().zip(&samples) {
            let assignment = mapping.get(pair.id).expect("assignment");
            let mixed = parse_recipe(&sample.mixed_output);
            let ce = parse_recipe(&sample.cross_entropy_output);

            assert_eq!(pair.slot(assignment.mixed_is), &mixed);
            assert_eq!(pair.slot(assignment.cross_entropy_is()), &ce);
            assert_eq!(assignment.mixed_is == Slot::A, pair.a == mixed);
        }
    }

    #[test]
    fn prepare_preserves_order_and_ids() {
        let samples = vec![
            sample(2, "{}", "{}"),
            sample(0, "{}", "{}"),
            sample(1, "{}", "{}"),
        ];
        let mapping = BlindingMap::generate(3, &mut SeededDraws::new(42));

        let ids: Vec<u64> = prepare(&samples, &mapping)
            .expect("prepare")
            .iter()
            .map(|pair| pair.id)
            .collect();
        assert_eq!(ids, vec![2, 0, 1]);
    }

    #[test]
    fn prepare_keeps_going_when_one_side_fails_to_parse() {
        let samples = vec![sample(0, "not json", &recipe_json("rice", "Boil"))];
        let mapping = BlindingMap::generate(1, &mut SeededDraws::new(42));

        let pairs = prepare(&samples, &mapping).expect("prepare");
        assert_eq!(parse_error_count(&pairs), 1);
    }

    #[test]
    fn prepare_rejects_samples_outside_the_mapping() {
        let samples = vec![sample(5, "{}", "{}")];
        let mapping = BlindingMap::generate(2, &mut SeededDraws::new(42));

        let err = prepare(&samples, &mapping).expect_err("unassigned sample");
        assert!(matches!(err, BlindingError::Unassigned(5)));
    }
}
