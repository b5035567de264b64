//! Transform for the `test` instrument, used to exercise the pipeline end to end.

use crate::error::ScriptError;
use crate::models::{PreScript, Reduction};
use crate::transforms::{rewrite_lines, Transform};

const INSTRUMENT: &str = "test";

/// Marker line rewritten by the transform.
pub const MARKER: &str = "# This line is inserted via test";

/// Stamps the reduction id onto the marker line of a test script.
#[derive(Debug, Default)]
pub struct TestTransform;

impl Transform for TestTransform {
    fn instrument(&self) -> &'static str {
        INSTRUMENT
    }

    fn apply(&self, script: &mut PreScript, reduction: &Reduction) -> Result<(), ScriptError> {
        tracing::info!(reduction = reduction.id, "beginning test transform");
        let text = rewrite_lines(&script.text, |line| {
            Ok(line
                .starts_with(MARKER)
                .then(|| format!("{} for reduction {}", MARKER, reduction.id)))
        })?;
        script.text = text;
        Ok(())
    }
}
