//! Property sensor risk scoring and real-time alerting.
//!
//! Readings flow through [`alerts::AlertEngine`] one at a time; admitted
//! events are pushed to carriers by the background [`notifications::Notifier`].
//! [`signals::RiskEngine`] periodically folds each home's recent history into
//! a weighted [`core::RiskScores`] record.

pub mod alerts;
pub mod config;
pub mod core;
pub mod db;
pub mod error;
pub mod notifications;
pub mod signals;
