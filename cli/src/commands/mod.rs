//! Command implementations for the Degen CLI
//!
//! Each command lives in its own file and returns a [`Report`] that the binary
//! prints in the selected output format.
//!
//! [`Report`]: crate::utils::formatting::Report

pub mod fee;
pub mod lookup;
pub mod renew;
pub mod status;
pub mod subscribe;

// Re-export command execution functions for easy access
pub use fee::execute as execute_fee;
pub use lookup::execute as execute_lookup;
pub use renew::execute as execute_renew;
pub use status::execute as execute_status;
pub use subscribe::execute as execute_subscribe;
