//! Request and response data-transfer objects.

pub mod otp_dto;

pub use otp_dto::{OtpParams, OtpResponse};
