//! Operational shell for the Telegram voice-chat bot: media toolchain
//! bootstrap, diagnostics, silence asset, configuration and health endpoint.

pub mod config;
pub mod diagnostics;
pub mod logging;
pub mod media;
pub mod owner_alerts;
pub mod server;
pub mod silence;
pub mod toolchain;
