//! # Validation Module
//!
//! Input validation run before business logic. Database constraints (UNIQUE
//! imei, foreign keys) are the second line of defense in gerai-db.

use crate::error::ValidationError;

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

// =============================================================================
// IMEI
// =============================================================================

/// Validates an IMEI serial.
///
/// ## Rules
/// - digits only
/// - 15 to 17 digits (IMEI is 15; IMEISV is 16; some importers pad to 17)
///
/// ## Example
/// ```rust
/// use gerai_core::validation::validate_imei;
///
/// assert!(validate_imei("356938035643809").is_ok());
/// assert!(validate_imei("").is_err());
/// assert!(validate_imei("35693803564380X").is_err());
/// ```
pub fn validate_imei(imei: &str) -> ValidationResult<()> {
    let imei = imei.trim();

    if imei.is_empty() {
        return Err(ValidationError::Required {
            field: "imei".to_string(),
        });
    }

    if !imei.chars().all(|c| c.is_ascii_digit()) {
        return Err(ValidationError::InvalidFormat {
            field: "imei".to_string(),
            reason: "must contain only digits".to_string(),
        });
    }

    if !(15..=17).contains(&imei.len()) {
        return Err(ValidationError::OutOfRange {
            field: "imei".to_string(),
            min: 15,
            max: 17,
        });
    }

    Ok(())
}

// =============================================================================
// Numeric Validators
// =============================================================================

/// Selling prices are non-negative; zero is allowed for giveaway units.
pub fn validate_price(rupiah: i64) -> ValidationResult<()> {
    if rupiah < 0 {
        return Err(ValidationError::OutOfRange {
            field: "selling_price".to_string(),
            min: 0,
            max: i64::MAX,
        });
    }
    Ok(())
}

/// Payment amounts must be strictly positive.
pub fn validate_payment_amount(rupiah: i64) -> ValidationResult<()> {
    if rupiah <= 0 {
        return Err(ValidationError::MustBePositive {
            field: "payment amount".to_string(),
        });
    }
    Ok(())
}

// =============================================================================
// UUID
// =============================================================================

/// Validates a UUID string format.
pub fn validate_uuid(id: &str) -> ValidationResult<()> {
    if id.trim().is_empty() {
        return Err(ValidationError::Required {
            field: "id".to_string(),
        });
    }

    uuid::Uuid::parse_str(id).map_err(|_| ValidationError::InvalidFormat {
        field: "id".to_string(),
        reason: "must be a valid UUID".to_string(),
    })?;

    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_imei() {
        assert!(validate_imei("356938035643809").is_ok()); // 15
        assert!(validate_imei("3569380356438090").is_ok()); // 16
        assert!(validate_imei("35693803564380901").is_ok()); // 17

        assert!(validate_imei("").is_err());
        assert!(validate_imei("   ").is_err());
        assert!(validate_imei("12345").is_err());
        assert!(validate_imei("356938035643809123").is_err()); // 18
        assert!(validate_imei("35693803564380X").is_err());
    }

    #[test]
    fn test_validate_price() {
        assert!(validate_price(0).is_ok());
        assert!(validate_price(12_000_000).is_ok());
        assert!(validate_price(-1).is_err());
    }

    #[test]
    fn test_validate_payment_amount() {
        assert!(validate_payment_amount(1).is_ok());
        assert!(validate_payment_amount(0).is_err());
        assert!(validate_payment_amount(-100).is_err());
    }

    #[test]
    fn test_validate_uuid() {
        assert!(validate_uuid("550e8400-e29b-41d4-a716-446655440000").is_ok());
        assert!(validate_uuid("").is_err());
        assert!(validate_uuid("not-a-uuid").is_err());
    }
}
