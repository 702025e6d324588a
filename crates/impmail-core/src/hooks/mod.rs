//! Hook registry
//!
//! Site-specific callbacks that may adjust behaviour at fixed extension
//! points. An unregistered hook is reported as `Error::HookNotSet`.

mod registry;

pub use registry::{Hooks, HooksBuilder, MboxSortHook, MdnCheckHook};
