//! tg-roster — bulk group roster tool for Telegram.
//!
//! Probes registration for a list of phone identities, adds the resolved
//! accounts to a target group, falls back to direct invite messages for
//! privacy-restricted accounts, reconciles the local contact list, and
//! writes a per-identity outcome report.

pub mod config;
pub mod directory;
pub mod error;
pub mod identity;
pub mod pipeline;
pub mod report;
pub mod roster;
pub mod throttle;
