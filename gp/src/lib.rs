//! Genpipe - command-line incremental AI file generation
//!
//! The `gp` binary wires the genframe framework into a pipeline tool:
//! argument cascade from environment, config files and command line, an
//! in-file prompting scanner, and a dependency-ordered batch executor.

pub mod cli;
pub mod config;
pub mod graph;
pub mod scan;
