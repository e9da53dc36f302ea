// src/parser/mod.rs

//! Streaming parser for the `go test -json` wire format.

pub mod event;
pub mod location;
pub mod source;
pub mod stream;

pub use event::{TestAction, TestEvent};
pub use stream::{EventStreamParser, StreamEnd, parse};
