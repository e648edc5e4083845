// Export modules for use in tests
pub mod inputs;
pub mod notification;
pub mod panic_handler;
pub mod sessions;
pub mod settings;
pub mod viewer;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use viewer::{Command, Viewer, ViewerConfig, ViewerEvent};
