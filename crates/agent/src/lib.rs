//! The agent side of agentloop.
//!
//! A request flows through four pieces:
//!
//! 1. **Adapt** inbound `{role, content}` records into history plus input
//! 2. **Trim** the history to the memory token budget
//! 3. **Loop**: ask the engine, run the tool it picks, feed the result back,
//!    until it answers or the step budget runs out
//! 4. **Stream** the final answer out word by word

pub mod adapter;
pub mod context;
pub mod loop_runner;
pub mod stream;

pub use adapter::{RawMessage, Turns, adapt};
pub use context::MemoryBuffer;
pub use loop_runner::AgentLoop;
pub use stream::StreamEmitter;
