//! Agent orchestrator (spec §4.3, components C4/C5): the tool registry and
//! the turn loop that drives the LLM to a final structured response.

pub mod orchestrator;
pub mod tools;

pub use orchestrator::{run, run_streaming, MAX_TOOL_ITERATIONS};
pub use tools::ToolRegistry;
