// private sub-module defined in other files
mod focal_window;
mod kernel;

// exports identifiers from private sub-modules in the current module namespace
pub use self::focal_window::{apply, EdgePolicy, FocalFn, FocalReducer, FocalStatistic};
pub use self::kernel::{Kernel, KernelAnchor};
