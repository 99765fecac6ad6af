//! camsetup - recording setup backend for desktop capture apps.
//!
//! This crate provides the two backend pieces a recording-setup panel needs:
//! device discovery plus capture-session lifecycle ([`capture`]), and
//! persisted, observable preference values ([`settings`]).

pub mod capture;
pub mod settings;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize tracing/logging for the host application.
///
/// Honors `RUST_LOG`; defaults to debug output for this crate.
pub fn init_logging() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "camsetup=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}
