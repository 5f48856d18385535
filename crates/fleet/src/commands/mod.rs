//! Command handlers, one module per top-level subcommand.

pub mod sites;
