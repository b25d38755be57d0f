//! Robots.txt handling module
//!
//! This module provides functionality for fetching, parsing, and caching robots.txt files.
//! Fetch failures and non-200 responses fail open to a permissive sentinel.

mod checker;
mod parser;

pub use checker::RobotChecker;
pub use parser::ParsedRobots;
