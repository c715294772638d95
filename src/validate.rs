use crate::error::AnalysisError;

/// Responses shorter than this, once trimmed, are treated as truncated.
pub const MIN_RESPONSE_CHARS: usize = 100;

/// Accepts the model's text when it is long enough to be a full analysis.
///
/// Only the length is checked; the accepted text is handed back untouched.
pub fn validate_response(text: String) -> Result<String, AnalysisError> {
    let length = text.trim().chars().count();
    if length < MIN_RESPONSE_CHARS {
        return Err(AnalysisError::IncompleteResponse { length });
    }
    Ok(text)
}
