//! Runtime traits for compute backend abstraction

pub mod client;
pub mod context;
pub mod device;
pub mod runtime;

pub use client::RuntimeClient;
pub use context::ExecutionContext;
pub use device::Device;
pub use runtime::Runtime;
