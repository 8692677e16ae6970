//! Anton: same-origin proxy and terminal client for the onboarding assistant.

pub mod config;
pub mod conversation;
pub mod error;
pub mod gateway;
pub mod onboarding;
pub mod proxy;
pub mod ui;
