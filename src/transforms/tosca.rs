//! TOSCA script transform.

use crate::error::ScriptError;
use crate::models::{PreScript, Reduction};
use crate::transforms::{python_quoted, python_run_list, rewrite_lines, Inputs, Transform};

const INSTRUMENT: &str = "tosca";

/// Sets the runs and cycle of a TOSCA script.
#[derive(Debug, Default)]
pub struct ToscaTransform;

impl Transform for ToscaTransform {
    fn instrument(&self) -> &'static str {
        INSTRUMENT
    }

    fn apply(&self, script: &mut PreScript, reduction: &Reduction) -> Result<(), ScriptError> {
        tracing::info!(reduction = reduction.id, "beginning tosca transform");
        let inputs = Inputs::new(INSTRUMENT, reduction);
        let text = rewrite_lines(&script.text, |line| {
            if line.starts_with("input_runs") {
                Ok(Some(format!(
                    "input_runs = {}",
                    python_run_list(inputs.get("runno")?)
                )))
            } else if line.starts_with("cycle =") {
                Ok(Some(format!(
                    "cycle = {}",
                    python_quoted(inputs.get("cycle_string")?)
                )))
            } else {
                Ok(None)
            }
        })?;
        script.text = text;
        tracing::info!(reduction = reduction.id, "tosca transform complete");
        Ok(())
    }
}
