//! Arena Host - Hosting Engine Boundary
//!
//! The lifecycle engine never owns entity data. Everything it reads or
//! writes goes through [`GameHost`], which the hosting game engine
//! implements. [`MemoryHost`] is a complete in-process implementation used
//! by tests and the demo server.
//!
//! # Example
//!
//! ```ignore
//! use arena_host::prelude::*;
//!
//! let host = MemoryHost::new();
//! let handles = host.spawn_player(PlayerId(42), "Vlad", Vec3::ZERO)?;
//! let identity: Identity = host.read(handles.character)?;
//! ```

pub mod component;
pub mod error;
pub mod host;
pub mod memory;

pub mod prelude {
    pub use crate::component::{
        Component, ComponentKind, ComponentValue, Controller, Identity, Session, Structure,
    };
    pub use crate::error::{HostError, HostResult};
    pub use crate::host::{GameHost, GameHostExt, PlayerHandles};
    pub use crate::memory::MemoryHost;
    pub use arena_core::prelude::*;
}

pub use prelude::*;
