//! Tool catalog and execution subsystem.
//!
//! [`registry`] holds the static descriptor catalog the router advertises
//! to the model; [`executor`] dispatches a named call with a JSON argument
//! blob, enforcing the workspace sandbox and per-tool constraints. The
//! remaining modules implement the individual tool semantics:
//!
//! | Module | Tools |
//! |--------|-------|
//! | [`shell`] | `bash`, `list_files` |
//! | [`fsops`] | `read_file`, `write_file`, `get_file_outline` |
//! | [`replace`] | `replace_in_file` strict replacement |
//! | [`patch`] | `apply_patch` envelope |
//! | [`diff`] | mini unified diff rendering |
//! | [`web`] | `web_fetch` |

pub mod diff;
pub mod executor;
pub mod fsops;
pub mod patch;
pub mod registry;
pub mod replace;
pub mod shell;
pub mod spec;
pub mod web;
