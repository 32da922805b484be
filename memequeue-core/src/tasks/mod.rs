// File: memequeue-core/src/tasks/mod.rs
pub mod playback_watchdog;
