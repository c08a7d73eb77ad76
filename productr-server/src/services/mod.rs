pub mod auth;
pub mod catalog;
pub mod mailer;
pub mod otp;
pub mod password;
