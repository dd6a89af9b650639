use std::sync::Arc;

use thiserror::Error;

use crate::dtos::auth_dtos::ForgotPasswordResponse;
use crate::errors::{AppError, Result};
use crate::models::user::UserRecord;
use crate::services::mail_service::Mailer;
use crate::services::otp_service::{decode_token, OtpPayload, OtpService};
use crate::services::user_directory::UserDirectory;

pub const RESET_SUBJECT: &str = "Password Reset";

/// Why a reset attempt was turned down. Checked in declaration order.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ResetRejection {
    #[error("Invalid token")]
    InvalidToken,

    #[error("User does not exist")]
    UnknownUser,

    #[error("Invalid code")]
    InvalidCode,
}

impl From<ResetRejection> for AppError {
    fn from(rejection: ResetRejection) -> Self {
        AppError::ValidationError(rejection.to_string())
    }
}

#[derive(Clone)]
pub struct PasswordResetService {
    users: Arc<dyn UserDirectory>,
    mailer: Arc<dyn Mailer>,
    otp: OtpService,
}

impl PasswordResetService {
    pub fn new(users: Arc<dyn UserDirectory>, mailer: Arc<dyn Mailer>, otp: OtpService) -> Self {
        Self { users, mailer, otp }
    }

    /// Mails a reset code to `email` and returns the matching token.
    ///
    /// Unknown addresses get an empty token and no mail.
    pub async fn request_reset(&self, email: &str) -> Result<ForgotPasswordResponse> {
        let Some(user) = self.users.find_by_email(email).await? else {
            tracing::info!("Password reset requested for unknown email");
            return Ok(ForgotPasswordResponse { token: String::new() });
        };

        let (code, token) = self.otp.generate_otp(&user.id)?;
        let body = reset_body(&user, &code, self.otp.life_span());

        if let Err(e) = self.mailer.send(&user.email, RESET_SUBJECT, &body).await {
            tracing::warn!("Failed to send reset code to user {}: {}", user.id, e);
        }

        Ok(ForgotPasswordResponse { token })
    }

    /// Sets a new password once `token` and `code` check out. Returns the user's email.
    pub async fn reset_password(&self, token: &str, code: &str, password: &str) -> Result<String> {
        let payload: OtpPayload = decode_token(token).ok_or(ResetRejection::InvalidToken)?;

        let user = self
            .users
            .find_by_id(&payload.user_id)
            .await?
            .ok_or(ResetRejection::UnknownUser)?;

        if !self.otp.verify_otp(code, &payload.secret) {
            return Err(ResetRejection::InvalidCode.into());
        }

        self.users.set_password(&user, password).await?;
        tracing::info!("Password reset for user {}", user.id);

        Ok(user.email)
    }

    pub async fn change_password(
        &self,
        user: &UserRecord,
        old_password: &str,
        new_password: &str,
    ) -> Result<()> {
        if !self.users.verify_password(user, old_password) {
            return Err(AppError::invalid_data("Incorrect password"));
        }

        self.users.set_password(user, new_password).await?;
        tracing::info!("Password changed for user {}", user.id);
        Ok(())
    }
}

fn reset_body(user: &UserRecord, code: &str, life_span: u64) -> String {
    let minutes = (life_span + 59) / 60;
    format!(
        "Hello {},\n\nYour password reset code is {}.\nIt expires in {} minute{}.\n\nIf you did not ask to reset your password, ignore this email.",
        user.name,
        code,
        minutes,
        if minutes == 1 { "" } else { "s" }
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::mail_service::MemoryMailer;
    use crate::services::otp_service::generate_token;
    use crate::services::user_directory::{InMemoryUserDirectory, PasswordHasher};

    struct Fixture {
        users: Arc<InMemoryUserDirectory>,
        mailer: Arc<MemoryMailer>,
        service: PasswordResetService,
    }

    async fn fixture() -> Fixture {
        let users = Arc::new(InMemoryUserDirectory::new(PasswordHasher::new(4)));
        users
            .create_user("test@email.com", "Test", "something-a-bit-serious")
            .await
            .unwrap();
        let mailer = Arc::new(MemoryMailer::default());
        let service = PasswordResetService::new(users.clone(), mailer.clone(), OtpService::default());

        Fixture { users, mailer, service }
    }

    fn code_from(body: &str) -> String {
        body.split_whitespace()
            .map(|word| word.trim_end_matches('.'))
            .find(|word| word.len() == 6 && word.chars().all(|c| c.is_ascii_digit()))
            .unwrap()
            .to_string()
    }

    fn message(err: AppError) -> String {
        match err {
            AppError::ValidationError(message) => message,
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn full_reset_flow() {
        let f = fixture().await;

        let response = f.service.request_reset("test@email.com").await.unwrap();
        assert!(!response.token.is_empty());

        let outbox = f.mailer.outbox();
        assert_eq!(outbox.len(), 1);
        assert_eq!(outbox[0].to, "test@email.com");
        assert_eq!(outbox[0].subject, RESET_SUBJECT);
        assert!(outbox[0].body.contains("10 minutes"));

        let code = code_from(&outbox[0].body);
        let email = f
            .service
            .reset_password(&response.token, &code, "a-new-password")
            .await
            .unwrap();
        assert_eq!(email, "test@email.com");

        let user = f.users.find_by_email("test@email.com").await.unwrap().unwrap();
        assert!(f.users.verify_password(&user, "a-new-password"));
    }

    #[tokio::test]
    async fn unknown_email_sends_nothing() {
        let f = fixture().await;

        let response = f.service.request_reset("nobody@email.com").await.unwrap();
        assert_eq!(response.token, "");
        assert!(f.mailer.outbox().is_empty());
    }

    #[tokio::test]
    async fn wrong_code_is_rejected() {
        let f = fixture().await;
        let response = f.service.request_reset("test@email.com").await.unwrap();
        let code = code_from(&f.mailer.outbox()[0].body);
        let wrong = if code == "000000" { "111111" } else { "000000" };

        let err = f
            .service
            .reset_password(&response.token, wrong, "a-new-password")
            .await
            .unwrap_err();
        assert_eq!(message(err), "Invalid code");

        let user = f.users.find_by_email("test@email.com").await.unwrap().unwrap();
        assert!(f.users.verify_password(&user, "something-a-bit-serious"));
    }

    #[tokio::test]
    async fn foreign_token_fails_before_code_check() {
        let f = fixture().await;
        let token = generate_token("hello").unwrap();

        let err = f
            .service
            .reset_password(&token, "123456", "a-new-password")
            .await
            .unwrap_err();
        assert_eq!(message(err), "Invalid token");
    }

    #[tokio::test]
    async fn token_for_missing_user() {
        let f = fixture().await;
        let token = generate_token(&OtpPayload {
            user_id: "404".to_string(),
            secret: crate::services::otp_service::generate_secret(),
        })
        .unwrap();

        let err = f
            .service
            .reset_password(&token, "123456", "a-new-password")
            .await
            .unwrap_err();
        assert_eq!(message(err), "User does not exist");
    }

    #[tokio::test]
    async fn change_password_checks_old_password() {
        let f = fixture().await;
        let user = f.users.find_by_id("1").await.unwrap().unwrap();

        let err = f
            .service
            .change_password(&user, "not-the-password", "a-new-password")
            .await
            .unwrap_err();
        assert_eq!(message(err), "Incorrect password");

        f.service
            .change_password(&user, "something-a-bit-serious", "a-new-password")
            .await
            .unwrap();
        let user = f.users.find_by_id("1").await.unwrap().unwrap();
        assert!(f.users.verify_password(&user, "a-new-password"));
    }

    #[test]
    fn body_rounds_expiry_up() {
        let now = chrono::Utc::now();
        let user = UserRecord {
            id: "1".to_string(),
            email: "a@a.com".to_string(),
            name: "A".to_string(),
            password_hash: String::new(),
            role: Default::default(),
            is_active: true,
            deleted: false,
            last_login: None,
            created_at: now,
            updated_at: now,
        };
        assert!(reset_body(&user, "123456", 30).contains("1 minute."));
        assert!(reset_body(&user, "123456", 600).contains("10 minutes."));
    }
}
