//! Phone number normalization for the WhatsApp channel.
//!
//! Guests arrive from spreadsheets with every imaginable phone format:
//! spaces, dashes, `00` international prefixes, bare national numbers.
//! Everything is normalized to E.164 before it reaches the carrier API.

use crate::channel::templates::Language;
use thiserror::Error;

/// A destination that can never be delivered to. Distinct from transport
/// failures: retrying does not help until the number itself is corrected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PhoneError {
    #[error("Phone number is empty")]
    Empty,
    #[error("No digits found in phone number: {0}")]
    NoDigits(String),
    #[error("Not a valid E.164 number: {raw} -> {normalized}")]
    InvalidFormat { raw: String, normalized: String },
}

/// Normalize a raw phone number to E.164 (`+34612345678`).
///
/// Rules, in order:
/// - a leading `+` means the country code is already present;
/// - a `00` prefix is the international dialing form of the same;
/// - `34` followed by nine digits is a Spanish number missing only the `+`;
/// - nine digits starting with 6 or 7 are a bare Spanish mobile number and
///   get `default_country_code` prepended (9 is a landline, normalized the
///   same way but unlikely to be reachable over WhatsApp);
/// - anything else gets `default_country_code` prepended as a best effort.
///
/// Normalization is idempotent: feeding the output back in returns it
/// unchanged.
pub fn normalize_phone(raw: &str, default_country_code: &str) -> Result<String, PhoneError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(PhoneError::Empty);
    }

    let has_plus = trimmed.starts_with('+');
    let digits: String = trimmed.chars().filter(|c| c.is_ascii_digit()).collect();
    if digits.is_empty() {
        return Err(PhoneError::NoDigits(raw.to_string()));
    }

    let normalized = if has_plus {
        format!("+{digits}")
    } else if let Some(rest) = digits.strip_prefix("00") {
        format!("+{rest}")
    } else if digits.starts_with("34") && digits.len() == 11 {
        format!("+{digits}")
    } else if digits.len() == 9 && matches!(digits.as_bytes()[0], b'6' | b'7') {
        format!("{default_country_code}{digits}")
    } else if digits.len() == 9 && digits.as_bytes()[0] == b'9' {
        tracing::warn!(
            name = "channel.phone.landline",
            target = concat!(env!("CARGO_PKG_NAME"), "::", module_path!()),
            phone = %format!("{default_country_code}{digits}"),
            message = "Landline number, may not be reachable over WhatsApp"
        );
        format!("{default_country_code}{digits}")
    } else {
        format!("{default_country_code}{digits}")
    };

    if !is_valid_e164(&normalized) {
        return Err(PhoneError::InvalidFormat {
            raw: raw.to_string(),
            normalized,
        });
    }

    Ok(normalized)
}

/// E.164 shape: `+`, a lead digit 1-9, then 6 to 14 more digits.
pub fn is_valid_e164(phone: &str) -> bool {
    let Some(rest) = phone.strip_prefix('+') else {
        return false;
    };
    let bytes = rest.as_bytes();
    (7..=15).contains(&bytes.len())
        && bytes[0] != b'0'
        && bytes.iter().all(|b| b.is_ascii_digit())
}

/// Language inferred from the country code: Spanish numbers get Spanish
/// copy, everything else (including unparseable numbers) gets English.
pub fn detect_language(phone: &str, default_country_code: &str) -> Language {
    match normalize_phone(phone, default_country_code) {
        Ok(normalized) if normalized.starts_with("+34") => Language::Es,
        _ => Language::En,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CC: &str = "+34";

    #[test]
    fn already_normalized_passes_through() {
        assert_eq!(normalize_phone("+34612345678", CC).unwrap(), "+34612345678");
        assert_eq!(normalize_phone("+447911123456", CC).unwrap(), "+447911123456");
    }

    #[test]
    fn separators_and_spaces_are_stripped() {
        assert_eq!(normalize_phone("612 34 56 78", CC).unwrap(), "+34612345678");
        assert_eq!(normalize_phone("612-345-678", CC).unwrap(), "+34612345678");
        assert_eq!(normalize_phone("(612) 345 678", CC).unwrap(), "+34612345678");
    }

    #[test]
    fn international_prefix_double_zero() {
        assert_eq!(normalize_phone("0034612345678", CC).unwrap(), "+34612345678");
        assert_eq!(normalize_phone("00447911123456", CC).unwrap(), "+447911123456");
    }

    #[test]
    fn spanish_number_missing_plus() {
        assert_eq!(normalize_phone("34612345678", CC).unwrap(), "+34612345678");
    }

    #[test]
    fn bare_mobile_gets_default_country_code() {
        assert_eq!(normalize_phone("612345678", CC).unwrap(), "+34612345678");
        assert_eq!(normalize_phone("712345678", CC).unwrap(), "+34712345678");
        // Different default for non-Spanish deployments.
        assert_eq!(normalize_phone("612345678", "+49").unwrap(), "+49612345678");
    }

    #[test]
    fn landline_normalizes_with_warning() {
        assert_eq!(normalize_phone("912345678", CC).unwrap(), "+34912345678");
    }

    #[test]
    fn normalization_is_idempotent() {
        for raw in ["612 345 678", "0034612345678", "+447911123456", "34612345678"] {
            let once = normalize_phone(raw, CC).unwrap();
            let twice = normalize_phone(&once, CC).unwrap();
            assert_eq!(once, twice, "{raw} did not stay fixed");
        }
    }

    #[test]
    fn empty_and_digitless_are_rejected() {
        assert_eq!(normalize_phone("", CC), Err(PhoneError::Empty));
        assert_eq!(normalize_phone("   ", CC), Err(PhoneError::Empty));
        assert_eq!(
            normalize_phone("abc", CC),
            Err(PhoneError::NoDigits("abc".to_string()))
        );
    }

    #[test]
    fn out_of_range_numbers_are_rejected() {
        // Too short once the plus is accounted for.
        assert!(normalize_phone("+123", CC).is_err());
        // Too long for E.164.
        assert!(normalize_phone("+1234567890123456", CC).is_err());
        // Lead digit zero after the plus.
        assert!(!is_valid_e164("+0123456789"));
    }

    #[test]
    fn e164_shape() {
        assert!(is_valid_e164("+34612345678"));
        assert!(is_valid_e164("+14155238886"));
        assert!(!is_valid_e164("34612345678"));
        assert!(!is_valid_e164("+34 612345678"));
    }

    #[test]
    fn spanish_numbers_speak_spanish() {
        assert_eq!(detect_language("+34612345678", CC), Language::Es);
        assert_eq!(detect_language("612345678", CC), Language::Es);
        assert_eq!(detect_language("+447911123456", CC), Language::En);
        assert_eq!(detect_language("not a phone", CC), Language::En);
    }
}
