//! Validation for catalog entities.
//!
//! Required-field checks run before any insert; a failed check aborts the
//! insert entirely so no partial row is ever written.

use super::models::{Artist, Label, Release, Track};
use thiserror::Error;

/// Validation error types
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("Field '{field}' is required but was empty")]
    EmptyField { field: &'static str },

    #[error("Field '{field}' must be positive, got {value}")]
    NonPositiveValue { field: &'static str, value: i32 },
}

/// Result type for validation operations
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Validate an artist entity
pub fn validate_artist(artist: &Artist) -> ValidationResult<()> {
    if artist.name.trim().is_empty() {
        return Err(ValidationError::EmptyField { field: "name" });
    }
    if artist.sort_name.trim().is_empty() {
        return Err(ValidationError::EmptyField { field: "sort_name" });
    }
    Ok(())
}

/// Validate a release entity
pub fn validate_release(release: &Release) -> ValidationResult<()> {
    if release.title.trim().is_empty() {
        return Err(ValidationError::EmptyField { field: "title" });
    }
    Ok(())
}

/// Validate a track entity
pub fn validate_track(track: &Track) -> ValidationResult<()> {
    if track.title.trim().is_empty() {
        return Err(ValidationError::EmptyField { field: "title" });
    }
    if track.track_number < 1 {
        return Err(ValidationError::NonPositiveValue {
            field: "track_number",
            value: track.track_number,
        });
    }
    Ok(())
}

/// Validate a label entity
pub fn validate_label(label: &Label) -> ValidationResult<()> {
    if label.name.trim().is_empty() {
        return Err(ValidationError::EmptyField { field: "name" });
    }
    Ok(())
}
