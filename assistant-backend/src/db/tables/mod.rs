//! Table operations - each module contains `impl Database` blocks for one table.

mod chunks;
mod conversations;
mod documents;
mod notes;

pub use chunks::NewChunk;
