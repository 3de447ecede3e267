//! The handler registry & command bus (C7): routes commands to their
//! registered handler through a shared middleware chain, building the
//! per-command-type [`commandflow_pipeline::Pipeline`] on first
//! registration.
//!
//! # Example
//!
//! ```
//! use commandflow_bus::CommandBus;
//! use commandflow_core::{Command, CommandError};
//!
//! struct Greet(String);
//!
//! impl Command for Greet {
//!     type Output = String;
//! }
//!
//! # async fn example() -> Result<(), CommandError> {
//! let bus = CommandBus::new();
//! bus.register::<Greet, _>(|cmd: Greet| async move { Ok(format!("hello, {}", cmd.0)) });
//!
//! let greeting = bus.send(Greet("world".into()), None).await?;
//! assert_eq!(greeting, "hello, world");
//! # Ok(())
//! # }
//! ```

mod bus;

pub use bus::CommandBus;
