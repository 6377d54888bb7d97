//! Generation engine for melody.
//!
//! [`GenerationEngine`] is the contract the job worker depends on. Calls are
//! synchronous and expensive; callers must run them on a blocking thread and
//! never issue two at once. [`MagentaEngine`] is the production
//! implementation: it runs the MagentaRT generator in a container and
//! post-processes the result with ffmpeg.

pub mod container;
pub mod engine;
pub mod error;
pub mod ffmpeg;
pub mod magenta;

pub use engine::{GenerationEngine, GenerationRequest};
pub use error::EngineError;
pub use magenta::{MagentaConfig, MagentaEngine};
