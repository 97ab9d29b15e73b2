pub mod clean;
pub mod guide;
pub mod mcp;
pub mod merge;
pub mod new;
pub mod stack;
