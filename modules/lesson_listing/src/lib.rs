// === PUBLIC CONTRACT ===
pub mod contract;

pub use contract::{client, error, model};

// === WIRING ===
pub mod module;
pub use module::{build_service, migrate};

// === INTERNAL MODULES ===
// Exposed for tests and the CLI; only `contract` is a stable API.
#[doc(hidden)]
pub mod config;
#[doc(hidden)]
pub mod domain;
#[doc(hidden)]
pub mod gateways;
#[doc(hidden)]
pub mod infra;
