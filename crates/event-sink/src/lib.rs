//! Event sink abstraction.
//!
//! This crate defines the `EventSink` trait that receives the message stream
//! of a sync, plus two implementations:
//!
//! - `JsonLinesSink` writes one JSON object per line (stdout in the CLI)
//! - `MemorySink` collects messages for inspection
//!
//! Messages are sync-core `SinkMessage` values, so sinks never depend on
//! source-specific types.

mod jsonl;
mod memory;
mod traits;

pub use jsonl::JsonLinesSink;
pub use memory::MemorySink;
pub use traits::EventSink;
