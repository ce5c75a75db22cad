//! Service layer for business logic

pub mod account_guard;

pub use account_guard::AccountGuard;
