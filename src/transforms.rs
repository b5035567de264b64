//! Instrument script transforms.
//!
//! A transform personalises an instrument's template script for one reduction by rewriting the
//! lines it recognises with values taken from the reduction's inputs. Transforms are line for
//! line: unrecognised lines, line order, line count and line endings are preserved exactly.

pub mod mari;
pub mod osiris;
pub mod test_instrument;
pub mod tosca;

use crate::error::ScriptError;
use crate::models::{PreScript, Reduction};

use hashbrown::HashMap;
use serde_json::Value;

/// Trait for instrument script transforms.
///
/// This forms the contract between the script resolver and the per instrument transforms.
pub trait Transform: Send + Sync {
    /// Name of the instrument this transform applies to.
    fn instrument(&self) -> &'static str;

    /// Rewrite the recognised lines of `script` using the inputs of `reduction`.
    ///
    /// On error `script` is left unmodified.
    ///
    /// # Arguments
    ///
    /// * `script`: Template script to transform in place
    /// * `reduction`: Reduction supplying the inputs
    fn apply(&self, script: &mut PreScript, reduction: &Reduction) -> Result<(), ScriptError>;
}

/// Maps instrument names to their transform. Lookups are case insensitive.
///
/// Built once at start up and immutable afterwards.
pub struct TransformRegistry {
    transforms: HashMap<String, Box<dyn Transform>>,
}

impl TransformRegistry {
    /// Return a registry without any transforms.
    pub fn empty() -> Self {
        Self {
            transforms: HashMap::new(),
        }
    }

    /// Return the registry with `transform` added.
    ///
    /// # Panics
    ///
    /// Panics if a transform is already registered for the same instrument.
    pub fn with(mut self, transform: impl Transform + 'static) -> Self {
        let instrument = transform.instrument().to_lowercase();
        let previous = self.transforms.insert(instrument, Box::new(transform));
        assert!(
            previous.is_none(),
            "Multiple transforms registered for one instrument.\nThis is a bug. Please report it to the application developers."
        );
        self
    }

    /// Return the transform for an instrument.
    ///
    /// # Arguments
    ///
    /// * `instrument`: Instrument name, in any case
    pub fn get_transform(&self, instrument: &str) -> Result<&dyn Transform, ScriptError> {
        self.transforms
            .get(&instrument.to_lowercase())
            .map(|transform| transform.as_ref())
            .ok_or_else(|| ScriptError::MissingTransform {
                instrument: instrument.to_string(),
            })
    }
}

impl Default for TransformRegistry {
    /// Return a registry of every supported instrument's transform.
    fn default() -> Self {
        Self::empty()
            .with(mari::MariTransform)
            .with(osiris::OsirisTransform)
            .with(tosca::ToscaTransform)
            .with(test_instrument::TestTransform)
    }
}

impl std::fmt::Debug for TransformRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut instruments: Vec<&String> = self.transforms.keys().collect();
        instruments.sort();
        f.debug_struct("TransformRegistry")
            .field("instruments", &instruments)
            .finish()
    }
}

/// Checked access to the inputs of a reduction on behalf of one instrument's transform.
pub(crate) struct Inputs<'a> {
    instrument: &'static str,
    reduction: &'a Reduction,
}

impl<'a> Inputs<'a> {
    pub(crate) fn new(instrument: &'static str, reduction: &'a Reduction) -> Self {
        Self {
            instrument,
            reduction,
        }
    }

    /// Return the input `key`, failing if the reduction does not have it.
    pub(crate) fn get(&self, key: &str) -> Result<&'a Value, ScriptError> {
        self.reduction
            .reduction_inputs
            .get(key)
            .ok_or_else(|| ScriptError::MissingReductionInput {
                instrument: self.instrument.to_string(),
                reduction_id: self.reduction.id,
                key: key.to_string(),
            })
    }
}

/// Rebuild `text`, replacing each line for which `rewrite` returns a new line.
///
/// Lines are passed to `rewrite` without their line ending, which is restored afterwards.
/// The first error aborts the rewrite.
pub(crate) fn rewrite_lines<F>(text: &str, mut rewrite: F) -> Result<String, ScriptError>
where
    F: FnMut(&str) -> Result<Option<String>, ScriptError>,
{
    let mut result = String::with_capacity(text.len());
    for segment in text.split_inclusive('\n') {
        let (line, ending) = split_line_ending(segment);
        match rewrite(line)? {
            Some(replacement) => {
                result.push_str(&replacement);
                result.push_str(ending);
            }
            None => result.push_str(segment),
        }
    }
    Ok(result)
}

fn split_line_ending(segment: &str) -> (&str, &str) {
    if let Some(line) = segment.strip_suffix("\r\n") {
        (line, "\r\n")
    } else if let Some(line) = segment.strip_suffix('\n') {
        (line, "\n")
    } else {
        (segment, "")
    }
}

/// Whether `line` assigns to the variable `name`, e.g. `name = ...` or `name=...`.
pub(crate) fn assigns(line: &str, name: &str) -> bool {
    line.strip_prefix(name)
        .map(str::trim_start)
        .map_or(false, |rest| rest.starts_with('=') && !rest.starts_with("=="))
}

/// Render a JSON value as a Python literal.
pub(crate) fn python_literal(value: &Value) -> String {
    match value {
        Value::Null => "None".to_string(),
        Value::Bool(b) => python_bool(*b).to_string(),
        Value::Number(n) => n.to_string(),
        Value::String(s) => quoted(s),
        Value::Array(items) => format!(
            "[{}]",
            items.iter().map(python_literal).collect::<Vec<_>>().join(", ")
        ),
        Value::Object(map) => format!(
            "{{{}}}",
            map.iter()
                .map(|(key, value)| format!("{}: {}", quoted(key), python_literal(value)))
                .collect::<Vec<_>>()
                .join(", ")
        ),
    }
}

/// Render a JSON value as the contents of a Python string: strings as they are, anything else
/// as its literal.
pub(crate) fn python_str(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => python_literal(other),
    }
}

/// Render a JSON value as a double quoted Python string literal.
pub(crate) fn python_quoted(value: &Value) -> String {
    quoted(&python_str(value))
}

/// Render run numbers as a Python list, wrapping a single run.
pub(crate) fn python_run_list(value: &Value) -> String {
    match value {
        Value::Array(_) => python_literal(value),
        single => format!("[{}]", python_literal(single)),
    }
}

pub(crate) fn python_bool(b: bool) -> &'static str {
    if b {
        "True"
    } else {
        "False"
    }
}

fn quoted(s: &str) -> String {
    format!("\"{}\"", s.replace('\\', "\\\\").replace('"', "\\\""))
}
