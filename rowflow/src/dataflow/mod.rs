//! Core dataflow primitives for reactive state management
//!
//! This module provides the foundational Actor+Relay architecture
//! components that the trigger, data source and table layers are built on.
//!
//! # Core Components
//!
//! - **[`Relay`]** - Ordered, fan-out event streaming over unbounded channels
//! - **[`Actor`]** - Single-value reactive state container with a processor task
//! - **[`TaskHandle`]** - Abort-on-drop handle for processor tasks
//!
//! # Architecture Principles
//!
//! 1. **Single Writer** - Only an Actor's processor mutates its `Mutable`
//! 2. **Event-Source Naming** - Relays follow `{source}_{event}_relay` pattern
//! 3. **No Direct Access** - State is read through signals
//! 4. **One Command Relay per Actor** - Commands are applied in arrival order

pub mod actor;
pub mod relay;
pub mod task;

pub use actor::Actor;
pub use relay::{Relay, relay};
pub use task::TaskHandle;
