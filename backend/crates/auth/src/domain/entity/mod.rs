//! Entities

pub mod audit;
pub mod event;
pub mod session;
pub mod user;
