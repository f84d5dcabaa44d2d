use serde_json::Value;

use super::ApiError;

/// Structural email check. Deliberately loose; the point is catching obvious
/// garbage, not RFC 5322 conformance.
pub fn is_valid_email(value: &str) -> bool {
    if value.chars().any(char::is_whitespace) {
        return false;
    }

    value.split_once('@').is_some_and(|(local, domain)| {
        !local.is_empty()
            && !domain.contains('@')
            && domain.contains('.')
            && !domain.starts_with('.')
            && !domain.ends_with('.')
    })
}

/// Trims, lowercases, and validates an identity email.
pub fn normalized_email(raw: &str) -> Result<String, ApiError> {
    let email = raw.trim().to_lowercase();

    if is_valid_email(&email) {
        Ok(email)
    } else {
        Err(ApiError::validation("Valid email is required"))
    }
}

/// Required text field: present and non-blank after trimming.
pub fn required_text(value: Option<&str>, message: &str) -> Result<String, ApiError> {
    match value.map(str::trim) {
        Some(text) if !text.is_empty() => Ok(text.to_string()),
        _ => Err(ApiError::validation(message)),
    }
}

/// Optional text field for partial updates: absent is fine, present but
/// blank is an error.
pub fn optional_text(value: Option<&str>, message: &str) -> Result<Option<String>, ApiError> {
    match value.map(str::trim) {
        None => Ok(None),
        Some(text) if text.is_empty() => Err(ApiError::validation(message)),
        Some(text) => Ok(Some(text.to_string())),
    }
}

/// Trims a free-form optional field, mapping blank to absent.
pub fn optional_trimmed(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|text| !text.is_empty())
        .map(ToString::to_string)
}

/// Accepts RFC 3339 timestamps or bare `YYYY-MM-DD` dates and normalizes
/// both to RFC 3339 UTC.
pub fn normalized_date(raw: &str, message: &str) -> Result<String, ApiError> {
    let trimmed = raw.trim();

    if let Ok(parsed) = chrono::DateTime::parse_from_rfc3339(trimmed) {
        return Ok(parsed.with_timezone(&chrono::Utc).to_rfc3339());
    }

    if let Ok(date) = chrono::NaiveDate::parse_from_str(trimmed, "%Y-%m-%d") {
        return Ok(date.and_time(chrono::NaiveTime::MIN).and_utc().to_rfc3339());
    }

    Err(ApiError::validation(message))
}

/// Coerces an untyped `customer` reference into a positive id. Kept untyped
/// so a wrong-typed value reports the fixed message instead of a 422.
pub fn required_customer_id(value: Option<&Value>) -> Result<i32, ApiError> {
    value
        .and_then(Value::as_i64)
        .and_then(|id| i32::try_from(id).ok())
        .filter(|id| *id > 0)
        .ok_or_else(|| ApiError::validation("Valid customer ID is required"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_normalized_email() {
        assert_eq!(
            normalized_email("  Admin@Customer360.COM ").unwrap(),
            "admin@customer360.com"
        );
        assert!(normalized_email("no-at-sign").is_err());
        assert!(normalized_email("@acme.io").is_err());
        assert!(normalized_email("a@b").is_err());
        assert!(normalized_email("a@.io").is_err());
        assert!(normalized_email("a b@acme.io").is_err());
        assert!(normalized_email("").is_err());
    }

    #[test]
    fn test_required_text() {
        assert_eq!(
            required_text(Some("  Acme  "), "Organization name is required").unwrap(),
            "Acme"
        );
        assert!(required_text(Some("   "), "Organization name is required").is_err());
        assert!(required_text(None, "Organization name is required").is_err());
    }

    #[test]
    fn test_optional_text() {
        assert_eq!(optional_text(None, "Title cannot be empty").unwrap(), None);
        assert_eq!(
            optional_text(Some(" Fix login "), "Title cannot be empty").unwrap(),
            Some("Fix login".to_string())
        );
        assert!(optional_text(Some("  "), "Title cannot be empty").is_err());
    }

    #[test]
    fn test_normalized_date() {
        assert_eq!(
            normalized_date("2026-03-01", "Invalid start date").unwrap(),
            "2026-03-01T00:00:00+00:00"
        );
        assert_eq!(
            normalized_date("2026-03-01T12:30:00+02:00", "Invalid start date").unwrap(),
            "2026-03-01T10:30:00+00:00"
        );
        assert!(normalized_date("March 1st", "Invalid start date").is_err());
        assert!(normalized_date("", "Invalid start date").is_err());
    }

    #[test]
    fn test_required_customer_id() {
        assert_eq!(required_customer_id(Some(&json!(7))).unwrap(), 7);
        assert!(required_customer_id(Some(&json!("7"))).is_err());
        assert!(required_customer_id(Some(&json!(0))).is_err());
        assert!(required_customer_id(Some(&json!(-3))).is_err());
        assert!(required_customer_id(Some(&json!(null))).is_err());
        assert!(required_customer_id(None).is_err());
    }
}
