//! UI components and windows.

pub mod date_panel;

pub use date_panel::DatePanel;
