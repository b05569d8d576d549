//! Acceptance rules for a new document against the active one.

use cdnroute_core::Document;

use crate::error::ValidationError;

/// Check that `next` may replace `active`.
///
/// With no active document anything well-formed is accepted. Otherwise, once the
/// active document names its CDN the new one must name the same CDN, and once it
/// carries a generation the new one must carry one that is not older.
pub fn validate<D: Document>(active: Option<&D>, next: &D) -> Result<(), ValidationError> {
    let Some(active) = active else {
        return Ok(());
    };

    if let Some(expected) = active.cdn_name() {
        if next.cdn_name() != Some(expected) {
            return Err(ValidationError::CdnMismatch {
                expected: expected.to_string(),
                found: next.cdn_name().map(str::to_string),
            });
        }
    }

    if let Some(active) = active.generation() {
        match next.generation() {
            None => return Err(ValidationError::MissingGeneration { active }),
            Some(found) if found < active => {
                return Err(ValidationError::StaleGeneration { active, found })
            }
            Some(_) => {}
        }
    }

    Ok(())
}
