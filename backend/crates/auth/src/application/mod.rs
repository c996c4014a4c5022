//! Application Layer
//!
//! Use cases and application services.

pub mod authenticate;
pub mod config;
pub mod dispatcher;
pub mod login;
pub mod logout;
pub mod profile;
pub mod refresh;
pub mod register;
pub mod services;

// Re-exports
pub use authenticate::{AuthenticateUseCase, AuthenticatedUser, TokenCheck};
pub use config::AuthConfig;
pub use dispatcher::{SideEffect, SideEffectDispatcher, spawn_side_effect_worker};
pub use login::{LoginInput, LoginOutput, LoginUseCase};
pub use logout::{LogoutInput, LogoutUseCase};
pub use profile::{ProfileOutput, ProfileUseCase};
pub use refresh::{RefreshInput, RefreshUseCase};
pub use register::{RegisterInput, RegisterOutput, RegisterUseCase};
pub use services::{AuthServices, TokenPair};
