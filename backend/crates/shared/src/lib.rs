//! Shared Kernel - vocabulary shared by every service
//!
//! - Unified error type ([`error::app_error::AppError`]) and its HTTP shape
//! - Typed identifiers ([`id::Id`])
//!
//! Only things with the same meaning in the auth service and the gateway
//! belong here.

pub mod error {
    pub mod app_error;
    pub mod conversions;
    pub mod kind;
}
pub mod id;
