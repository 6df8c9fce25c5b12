//! Library half of the `orc` CLI: the `serve` entry point plus the
//! out-of-process collaborator and tool realizations it wires together.
//! The client-facing subcommands live in `src/client.rs`, part of the `orc`
//! binary crate rather than this library.

pub mod process;
pub mod serve;
pub mod tools_manifest;
