use std::fmt;

pub const CAMPAIGN_NAME_MAX_LEN: usize = 255;
pub const SHORT_DESCRIPTION_MAX_LEN: usize = 500;
pub const FILE_REFERENCE_MAX_LEN: usize = 1024;
pub const PERK_MAX_LEN: usize = 255;
pub const MAX_PERKS: usize = 50;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    pub fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

impl std::error::Error for ValidationError {}

pub type ValidationResult = Result<(), ValidationError>;

pub fn sanitize_string(value: &str) -> String {
    value
        .chars()
        .filter(|ch| !ch.is_control())
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

pub fn validate_required(field: &'static str, value: &str) -> ValidationResult {
    if value.trim().is_empty() {
        return Err(ValidationError::new(field, "must not be empty"));
    }

    Ok(())
}

pub fn validate_max_len(field: &'static str, value: &str, max_len: usize) -> ValidationResult {
    if value.chars().count() > max_len {
        return Err(ValidationError::new(
            field,
            format!("must be at most {} characters", max_len),
        ));
    }

    Ok(())
}

pub fn validate_positive_amount(field: &'static str, amount: i64) -> ValidationResult {
    if amount <= 0 {
        return Err(ValidationError::new(field, "must be greater than zero"));
    }

    Ok(())
}

pub fn validate_campaign_name(name: &str) -> ValidationResult {
    validate_required("name", name)?;
    validate_max_len("name", name, CAMPAIGN_NAME_MAX_LEN)?;

    if slug::slugify(name).is_empty() {
        return Err(ValidationError::new(
            "name",
            "must contain at least one letter or digit",
        ));
    }

    Ok(())
}

/// Trims and drops empty perks, then bounds the list.
pub fn normalize_perks(perks: &[String]) -> Result<Vec<String>, ValidationError> {
    let perks: Vec<String> = perks
        .iter()
        .map(|perk| sanitize_string(perk))
        .filter(|perk| !perk.is_empty())
        .collect();

    if perks.len() > MAX_PERKS {
        return Err(ValidationError::new(
            "perks",
            format!("must have at most {} entries", MAX_PERKS),
        ));
    }
    for perk in &perks {
        validate_max_len("perks", perk, PERK_MAX_LEN)?;
    }

    Ok(perks)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validates_required_field() {
        assert!(validate_required("field", "value").is_ok());
        assert!(validate_required("field", "   ").is_err());
    }

    #[test]
    fn validates_max_len() {
        assert!(validate_max_len("field", "abc", 3).is_ok());
        assert!(validate_max_len("field", "abcd", 3).is_err());
    }

    #[test]
    fn sanitizes_string() {
        assert_eq!(sanitize_string("  hello\tworld  "), "hello world");
        assert_eq!(sanitize_string("single"), "single");
        assert_eq!(sanitize_string(" \n "), "");
        assert_eq!(sanitize_string("ab\u{0000}cd\u{0007}"), "abcd");
    }

    #[test]
    fn validates_positive_amount() {
        assert!(validate_positive_amount("amount", 1).is_ok());
        assert!(validate_positive_amount("amount", 0).is_err());
        assert!(validate_positive_amount("amount", -10).is_err());
    }

    #[test]
    fn validates_campaign_name() {
        assert!(validate_campaign_name("Clean Water").is_ok());
        assert!(validate_campaign_name("").is_err());
        assert!(validate_campaign_name("!!!").is_err());
        assert!(validate_campaign_name(&"a".repeat(256)).is_err());
    }

    #[test]
    fn normalizes_perks() {
        let perks = vec![
            " sticker ".to_string(),
            "".to_string(),
            "t-shirt,\tsize M".to_string(),
        ];
        assert_eq!(
            normalize_perks(&perks).unwrap(),
            vec!["sticker".to_string(), "t-shirt, size M".to_string()]
        );

        let too_many = vec!["x".to_string(); MAX_PERKS + 1];
        assert!(normalize_perks(&too_many).is_err());
    }
}
