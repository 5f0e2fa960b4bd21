//! `kbase` command-line front end for the knowledge-file upload workflow.

pub mod cli;
pub mod commands;
pub mod config;
pub mod output;
pub mod progress;
pub mod timing;
