//! CLI module for stakeout - command-line interface and subcommands.
//!
//! Provides the entry point with subcommands for local watching, remote
//! watcher/notifier pairs, and key generation.

pub mod commands;

pub use commands::Cli;
