// Export modules for use in tests
pub mod panic_handler;
pub mod settings;
pub mod telemetry;
pub mod viewer;

// Re-export the engine surface
pub use viewer::{EngineConfig, EngineEvent, LoadState, ViewerEngine};
