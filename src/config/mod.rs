//! Configuration
//!
//! Supervision settings, their validation, and the shared closed enums.

pub mod supervision;
pub mod types;
pub mod validator;
