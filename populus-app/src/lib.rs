//! The `populus` command line: argument parsing and the run sequence.
pub mod cli;
pub mod run;
