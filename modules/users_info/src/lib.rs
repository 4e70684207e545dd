// === PUBLIC CONTRACT ===
pub mod contract;
pub use contract::model;

// === MODULE DEFINITION ===
pub mod module;
pub use module::UsersInfo;

// === INTERNAL MODULES ===
// Exposed for integration tests; other crates should go through `UsersInfo`.
#[doc(hidden)]
pub mod api;
#[doc(hidden)]
pub mod config;
#[doc(hidden)]
pub mod domain;
#[doc(hidden)]
pub mod infra;
