//! Field constraints of the forms.
//!
//! Lengths count characters, not bytes. The first violated constraint wins.

use crate::errors::AppError;

#[derive(Debug, Default)]
pub struct Validator {
    first_error: Option<String>,
}

impl Validator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn required(self, field: &str, value: &str) -> Self {
        self.check(!value.trim().is_empty(), || format!("{field}: campo obligatorio"))
    }

    pub fn present<T>(self, field: &str, value: &Option<T>) -> Self {
        self.check(value.is_some(), || format!("{field}: campo obligatorio"))
    }

    /// Required, with `min..=max` characters.
    pub fn length(self, field: &str, value: &str, min: usize, max: usize) -> Self {
        self.required(field, value).bounded(field, value, min, Some(max))
    }

    /// Required, with at least `min` characters.
    pub fn min_length(self, field: &str, value: &str, min: usize) -> Self {
        self.required(field, value).bounded(field, value, min, None)
    }

    /// `min..=max` characters when a value is given.
    pub fn optional_length(self, field: &str, value: &str, min: usize, max: usize) -> Self {
        if value.is_empty() {
            return self;
        }
        self.bounded(field, value, min, Some(max))
    }

    pub fn email(self, field: &str, value: &str) -> Self {
        self.required(field, value)
            .check(is_email(value), || format!("{field}: correo electrónico no válido"))
    }

    pub fn finish(self) -> Result<(), AppError> {
        match self.first_error {
            Some(message) => Err(AppError::Validation(message)),
            None => Ok(()),
        }
    }

    fn bounded(self, field: &str, value: &str, min: usize, max: Option<usize>) -> Self {
        let len = value.chars().count();
        self.check(len >= min, || {
            format!("{field}: debe tener al menos {min} caracteres")
        })
        .check(max.map_or(true, |max| len <= max), || {
            format!("{field}: no puede superar {} caracteres", max.unwrap_or_default())
        })
    }

    fn check(mut self, ok: bool, message: impl FnOnce() -> String) -> Self {
        if !ok && self.first_error.is_none() {
            self.first_error = Some(message());
        }
        self
    }
}

fn is_email(value: &str) -> bool {
    let Some((local, domain)) = value.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && !domain.is_empty()
        && !domain.contains('@')
        && !domain.starts_with('.')
        && !domain.ends_with('.')
        && !value.chars().any(char::is_whitespace)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn message(result: Result<(), AppError>) -> String {
        match result {
            Err(AppError::Validation(message)) => message,
            other => panic!("expected a validation error, got {:?}", other),
        }
    }

    #[test]
    fn test_lengths_count_characters() {
        assert!(Validator::new().length("name", "Aula Año", 6, 50).finish().is_ok());
        assert_eq!(
            message(Validator::new().length("name", "Aula", 6, 50).finish()),
            "name: debe tener al menos 6 caracteres"
        );
        assert_eq!(
            message(Validator::new().length("title", &"x".repeat(101), 3, 100).finish()),
            "title: no puede superar 100 caracteres"
        );
    }

    #[test]
    fn test_first_error_wins() {
        let err = Validator::new()
            .required("image", "")
            .length("name", "", 6, 50)
            .finish();
        assert_eq!(message(err), "image: campo obligatorio");
    }

    #[test]
    fn test_optional_length_skips_empty() {
        assert!(Validator::new()
            .optional_length("diagnose", "", 5, 500)
            .finish()
            .is_ok());
        assert!(Validator::new()
            .optional_length("comment", "ok", 5, 500)
            .finish()
            .is_err());
    }

    #[test]
    fn test_email() {
        assert!(Validator::new().email("email", "tic@ies.es").finish().is_ok());
        for bad in ["", "tic", "tic@", "@ies.es", "t ic@ies.es", "a@b@c"] {
            assert!(Validator::new().email("email", bad).finish().is_err(), "{bad}");
        }
    }
}
