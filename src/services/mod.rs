pub mod mail_service;
pub mod otp_service;
pub mod password_reset;
pub mod token_service;
pub mod user_directory;
