//! OSIRIS script transform.

use crate::error::ScriptError;
use crate::models::{PreScript, Reduction};
use crate::transforms::{
    python_bool, python_quoted, python_run_list, rewrite_lines, Inputs, Transform,
};

const INSTRUMENT: &str = "osiris";

/// Sets the runs, calibration, cycle, analyser and reduction mode of an OSIRIS script.
#[derive(Debug, Default)]
pub struct OsirisTransform;

impl Transform for OsirisTransform {
    fn instrument(&self) -> &'static str {
        INSTRUMENT
    }

    fn apply(&self, script: &mut PreScript, reduction: &Reduction) -> Result<(), ScriptError> {
        tracing::info!(reduction = reduction.id, "beginning osiris transform");
        let inputs = Inputs::new(INSTRUMENT, reduction);
        let text = rewrite_lines(&script.text, |line| {
            let replacement = if line.starts_with("input_runs") {
                format!("input_runs = {}", python_run_list(inputs.get("runno")?))
            } else if line.starts_with("calibration_file_path") {
                format!(
                    "calibration_file_path = {}",
                    python_quoted(inputs.get("calibration_file_path")?)
                )
            } else if line.starts_with("cycle =") {
                format!("cycle = {}", python_quoted(inputs.get("cycle_string")?))
            } else if line.starts_with("reflection = ") {
                format!("reflection = {}", python_quoted(inputs.get("analyser")?))
            } else if line.starts_with("spectroscopy_reduction =") {
                let mode = inputs.get("mode")?;
                format!(
                    "spectroscopy_reduction = {}",
                    python_bool(*mode == "spectroscopy")
                )
            } else if line.starts_with("diffraction_reduction = ") {
                let mode = inputs.get("mode")?;
                format!(
                    "diffraction_reduction = {}",
                    python_bool(*mode == "diffraction")
                )
            } else {
                return Ok(None);
            };
            Ok(Some(replacement))
        })?;
        script.text = text;
        tracing::info!(reduction = reduction.id, "osiris transform complete");
        Ok(())
    }
}
