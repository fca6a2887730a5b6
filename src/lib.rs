//! Workspace umbrella crate.
//!
//! Exposes the feature flags that map onto the individual workspace crates
//! (`core-service`, `core-playback`, `core-runtime`). Host applications can
//! depend on `preload-workspace` and enable `desktop-shims` without wiring
//! each crate individually.

#[cfg(feature = "desktop-shims")]
pub use core_playback as playback;
#[cfg(feature = "desktop-shims")]
pub use core_runtime as runtime;
#[cfg(feature = "desktop-shims")]
pub use core_service as service;
