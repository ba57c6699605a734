//! Shared library modules for the nouncast bot.
//!
//! Re-exports modules needed by standalone binaries (e.g. `leaderboard`)
//! without duplicating code from the main binary.

pub mod chain;
pub mod config;
pub mod farcaster;
pub mod format;
