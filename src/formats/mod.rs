//! Structural validators for the two supported document families.

pub mod compound;
pub mod container;

use crate::error::ValidationError;
use crate::types::{FormatFamily, ValidationResult};

pub use compound::validate_compound;
pub use container::validate_container;

/// Runs the validator for `family` over the candidate bytes.
///
/// A malformed candidate is an ordinary `valid = false` result; only
/// underlying I/O failures are returned as errors.
pub fn validate_candidate(
    family: FormatFamily,
    bytes: &[u8],
) -> Result<ValidationResult, std::io::Error> {
    let outcome = match family {
        FormatFamily::Container => validate_container(bytes),
        FormatFamily::Compound => validate_compound(bytes),
    };

    match outcome {
        Ok(result) => Ok(result),
        Err(ValidationError::Malformed(reason)) => Ok(ValidationResult::invalid(reason)),
        Err(ValidationError::Io(err)) => Err(err),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_garbage_is_invalid_not_error() {
        let garbage = vec![0xAAu8; 4096];
        let result = validate_candidate(FormatFamily::Container, &garbage).unwrap();
        assert!(!result.valid);
        assert!(!result.reason.is_empty());

        let result = validate_candidate(FormatFamily::Compound, &garbage).unwrap();
        assert!(!result.valid);
        assert!(!result.reason.is_empty());
    }

    #[test]
    fn test_empty_input_is_invalid() {
        assert!(!validate_candidate(FormatFamily::Container, &[]).unwrap().valid);
        assert!(!validate_candidate(FormatFamily::Compound, &[]).unwrap().valid);
    }
}
