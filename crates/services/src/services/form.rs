//! Helpers for turning loosely-typed request fields into model values.

use std::str::FromStr;

use utils::validation::ValidationErrors;

/// Blank strings count as absent, so a form that submits `""` leaves the
/// stored value untouched.
pub fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Parses an enum-valued field, recording an error when the value is not one
/// of the accepted variants.
pub fn parse_choice<T: FromStr>(
    errors: &mut ValidationErrors,
    field: &str,
    value: Option<&str>,
) -> Option<T> {
    let value = value?;
    match T::from_str(value.trim()) {
        Ok(parsed) => Some(parsed),
        Err(_) => {
            errors.add(
                field,
                format!("The selected {} is invalid.", field.replace('_', " ")),
            );
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use db::models::user::UserType;

    use super::*;

    #[test]
    fn blank_becomes_none() {
        assert_eq!(non_blank(Some("  ".to_string())), None);
        assert_eq!(non_blank(Some(" x ".to_string())), Some("x".to_string()));
        assert_eq!(non_blank(None), None);
    }

    #[test]
    fn unknown_choice_is_reported() {
        let mut errors = ValidationErrors::new();
        let parsed: Option<UserType> = parse_choice(&mut errors, "user_type", Some("donor"));
        assert_eq!(parsed, Some(UserType::Donor));
        let parsed: Option<UserType> = parse_choice(&mut errors, "user_type", Some("volunteer"));
        assert!(parsed.is_none());
        assert_eq!(
            errors.errors["user_type"][0],
            "The selected user type is invalid."
        );
    }
}
