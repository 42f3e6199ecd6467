//! Trait for runtime clients that own a device's execution resources

use super::Runtime;
use crate::error::Result;

/// Trait for runtime clients that handle dispatch and synchronization
pub trait RuntimeClient<R: Runtime>: Clone + Send + Sync {
    /// Get the device this client operates on
    fn device(&self) -> &R::Device;

    /// Synchronize: wait for all pending operations to complete
    ///
    /// A failed synchronization is reported, since results written by
    /// earlier asynchronous work can no longer be trusted.
    fn synchronize(&self) -> Result<()>;
}
