//! UI layer for the desktop greeting form.

pub mod app;

pub use app::{DesktopGuiApp, StartupConfig};
