// ABOUTME: Sealed marker for the runtime capability traits.
// ABOUTME: Only runtimes defined in this crate may implement them.

/// Implemented by the bollard runtime, the compose driver, and test doubles.
pub trait Sealed {}
