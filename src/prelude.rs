//! Convenient imports for the tuple space.
//!
//! ```
//! use tuplespace::prelude::*;
//!
//! let space = Space::builder()
//!     .register(TypeSchema::new("Job").attribute("queue"))
//!     .open()?;
//! space.write(Entry::new("Job").with("queue", "default"), 1);
//! # Ok::<(), Error>(())
//! ```

// Main entry point
pub use crate::{Space, SpaceBuilder, SpaceConfig, SpaceStats};

// Error handling
pub use crate::{Error, Result};

// Entries and schemas
pub use crate::{Entry, TypeSchema, Value};

// Notifications
pub use crate::Listener;
