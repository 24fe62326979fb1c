//! # Rudis Client
//!
//! Purpose: Provide a lightweight, asynchronous client for a Redis-like
//! key-value/set store speaking a minimal space-separated text protocol.
//!
//! ## Design Principles
//! 1. **Facade Pattern**: `Client` hides the reader task and transport details.
//! 2. **Structural Serialization**: One request in flight at a time, enforced
//!    by construction rather than by call-site discipline.
//! 3. **Fail Fast**: A broken connection fails every waiter instead of hanging.
//! 4. **Substitutable Transport**: Any duplex stream works, enabling test
//!    doubles without touching the network.

mod client;
mod conn;
mod error;

pub use client::{Client, ClientConfig};
pub use error::{ClientError, ClientResult};
