//! MARI script transform.

use crate::error::ScriptError;
use crate::models::{PreScript, Reduction};
use crate::transforms::{assigns, python_literal, rewrite_lines, Inputs, Transform};

const INSTRUMENT: &str = "mari";

/// Script variables set from the reduction input of the same name.
const VARIABLES: [&str; 9] = [
    "runno",
    "sum_runs",
    "ei",
    "sam_mass",
    "sam_rmm",
    "monovan",
    "remove_bkg",
    "mask_file_link",
    "wbvan",
];

/// Sets the run, incident energy, sample, vanadium and mask variables of a MARI script.
#[derive(Debug, Default)]
pub struct MariTransform;

impl Transform for MariTransform {
    fn instrument(&self) -> &'static str {
        INSTRUMENT
    }

    fn apply(&self, script: &mut PreScript, reduction: &Reduction) -> Result<(), ScriptError> {
        tracing::info!(reduction = reduction.id, "beginning mari transform");
        let inputs = Inputs::new(INSTRUMENT, reduction);
        let text = rewrite_lines(&script.text, |line| {
            match VARIABLES.iter().find(|variable| assigns(line, variable)) {
                Some(variable) => Ok(Some(format!(
                    "{} = {}",
                    variable,
                    python_literal(inputs.get(variable)?)
                ))),
                None => Ok(None),
            }
        })?;
        script.text = text;
        tracing::info!(reduction = reduction.id, "mari transform complete");
        Ok(())
    }
}
