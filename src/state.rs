use std::sync::Arc;

use crate::config::AppConfig;
use crate::errors::Result;
use crate::services::mail_service::Mailer;
use crate::services::otp_service::OtpService;
use crate::services::password_reset::PasswordResetService;
use crate::services::token_service::TokenService;
use crate::services::user_directory::UserDirectory;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub users: Arc<dyn UserDirectory>,
    pub tokens: TokenService,
    pub otp: OtpService,
    pub mailer: Arc<dyn Mailer>,
}

impl AppState {
    pub fn new(config: AppConfig, users: Arc<dyn UserDirectory>, mailer: Arc<dyn Mailer>) -> Result<Self> {
        let otp = OtpService::new(config.code_life_span, config.code_skew_steps)?;
        let tokens = TokenService::new(
            &config.jwt_secret,
            config.access_token_lifetime,
            config.refresh_token_lifetime,
        );

        Ok(AppState {
            config: Arc::new(config),
            users,
            tokens,
            otp,
            mailer,
        })
    }

    pub fn password_reset(&self) -> PasswordResetService {
        PasswordResetService::new(self.users.clone(), self.mailer.clone(), self.otp)
    }
}
