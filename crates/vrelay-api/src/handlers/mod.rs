//! Request handlers.

pub mod health;
pub mod jobs;
pub mod videos;
pub mod webhook;
pub mod workflow;

pub use health::*;
pub use jobs::*;
pub use videos::*;
pub use webhook::*;
pub use workflow::*;
