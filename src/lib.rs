//! Stacked git worktrees for parallel AI agent workflows.
//!
//! `st` keeps one worktree per branch, records which branch each one is
//! stacked on, and runs sync, merge and ship across a whole stack. See the
//! `st guide` topics for the workflow.
//!
//! The library API is not stable; it exists so the binary and its tests can
//! share one implementation.

pub mod assistant;
pub mod branch;
pub mod config;
pub mod context;
pub mod error;
pub mod git;
pub mod integrate;
pub mod issue;
pub mod mcp;
pub mod multiplexer;
pub mod path;
pub mod prompt;
pub mod secrets;
pub mod shell_exec;
pub mod stack;
pub mod styling;
pub mod worktree;

#[cfg(test)]
mod testing;
