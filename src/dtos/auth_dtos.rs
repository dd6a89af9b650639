use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};

/// Rejects names made only of whitespace, which would be stored empty.
pub fn not_blank(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        let mut err = ValidationError::new("blank");
        err.message = Some("Name may not be blank".into());
        return Err(err);
    }
    Ok(())
}

#[derive(Debug, Deserialize, Validate)]
pub struct SignUpRequest {
    #[validate(email(message = "Enter a valid email address"))]
    pub email: String,

    #[validate(
        length(min = 1, max = 150, message = "Name must be between 1 and 150 characters"),
        custom(function = "not_blank")
    )]
    pub name: String,

    #[validate(length(min = 6, message = "Password must be at least 6 characters"))]
    pub password: String,

    #[validate(length(min = 6, message = "Password must be at least 6 characters"))]
    pub password2: String,
}

impl SignUpRequest {
    pub fn passwords_match(&self) -> bool {
        self.password == self.password2
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(length(min = 1, message = "Email is required"))]
    pub email: String,

    #[validate(length(min = 1, message = "Password is required"))]
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct RefreshRequest {
    pub refresh: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct ForgotPasswordRequest {
    #[validate(email(message = "Enter a valid email address"))]
    pub email: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct ResetPasswordRequest {
    #[validate(length(min = 1, message = "Token is required"))]
    pub token: String,

    #[validate(length(min = 6, message = "Code must be at least 6 characters"))]
    pub code: String,

    #[validate(length(min = 6, message = "Password must be at least 6 characters"))]
    pub password: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct ChangePasswordRequest {
    #[validate(length(min = 6, message = "Password must be at least 6 characters"))]
    pub old_password: String,

    #[validate(length(min = 6, message = "Password must be at least 6 characters"))]
    pub new_password: String,
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct ForgotPasswordResponse {
    pub token: String,
}

#[derive(Debug, Serialize)]
pub struct ResetPasswordResponse {
    pub message: String,
}

#[derive(Debug, Serialize, Default)]
pub struct ChangePasswordResponse {
    pub old_password: String,
    pub new_password: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signup_rules() {
        let request = SignUpRequest {
            email: "not-an-email".to_string(),
            name: "Test".to_string(),
            password: "short".to_string(),
            password2: "short".to_string(),
        };
        let errors = request.validate().unwrap_err();
        let fields = errors.field_errors();

        assert!(fields.contains_key("email"));
        assert!(fields.contains_key("password"));
        assert!(!fields.contains_key("name"));
    }

    #[test]
    fn signup_rejects_blank_name() {
        let request = SignUpRequest {
            email: "test@email.com".to_string(),
            name: "   ".to_string(),
            password: "something-a-bit-serious".to_string(),
            password2: "something-a-bit-serious".to_string(),
        };
        let errors = request.validate().unwrap_err();
        assert!(errors.field_errors().contains_key("name"));
    }

    #[test]
    fn reset_code_needs_six_characters() {
        let request = ResetPasswordRequest {
            token: "TOKEN".to_string(),
            code: "123".to_string(),
            password: "something-a-bit-serious".to_string(),
        };
        assert!(request.validate().is_err());
    }
}
