//! CLI command implementations
//!
//! Commands are organized by domain:
//! - `core` - Init and shared utilities (open_db, open_service, parsing, output)
//! - `automation` - Automation run, daily pipeline, scheduled watch
//! - `forecast` - Monthly, weekly and summary projections
//! - `alerts` - Alert list/read/dismiss
//! - `sources` - Recurring sources and categories
//! - `ledger` - Ledger entries, balances and expected income
//! - `status` - Database status

pub mod alerts;
pub mod automation;
pub mod core;
pub mod forecast;
pub mod ledger;
pub mod sources;
pub mod status;

// Re-export command functions for main.rs
pub use alerts::*;
pub use automation::*;
pub use core::*;
pub use forecast::*;
pub use ledger::*;
pub use sources::*;
pub use status::*;

/// Truncate a string to a maximum length, adding "..." if truncated
pub fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}
