//! Validation of externally supplied identifiers used to build file system and remote paths.

use crate::error::ScriptError;

/// Characters that could be used to escape a directory or reference a parent.
const FORBIDDEN_CHARACTERS: [char; 3] = ['.', '/', '\\'];

/// Validate an identifier before it is interpolated into a path.
///
/// Returns the identifier unchanged if it contains none of `.`, `/` or `\`, otherwise
/// [ScriptError::UnsafeIdentifier].
///
/// # Arguments
///
/// * `identifier`: Instrument name or version tag supplied by a client
pub fn validate(identifier: &str) -> Result<&str, ScriptError> {
    if identifier.contains(&FORBIDDEN_CHARACTERS[..]) {
        return Err(ScriptError::UnsafeIdentifier {
            identifier: identifier.to_string(),
        });
    }
    Ok(identifier)
}
