//! quill-tar - tarball handling for quill system packages
//!
//! This crate packs a directory tree into a gzip-compressed tar stream and
//! reverses the process, applying ignore-rule filtering on the way in and a
//! normalized permission/ownership policy on the way out.

// Enforce strict code quality and reliability
#![deny(
    // Safety
    unsafe_code,

    // Correctness
    missing_debug_implementations,

    // Future compatibility
    future_incompatible,

    // Rust 2018 idioms
    rust_2018_idioms,
)]
#![warn(
    // Documentation
    missing_docs,

    // Error handling best practices
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::unimplemented,
    clippy::todo,

    // Code clarity and maintainability
    clippy::inefficient_to_string,
    clippy::clone_on_ref_ptr,
    clippy::wildcard_imports,
    clippy::enum_glob_use,
    clippy::if_not_else,
    clippy::needless_continue,
    clippy::explicit_iter_loop,
)]

pub mod exceptions;
pub mod filter;
pub mod logger;
pub mod pack;
pub mod pipeline;
pub mod policy;
pub mod unpack;

// Re-export the operation surface
pub use exceptions::{QuillTarError, Result};
pub use pack::{IgnoreRules, PackOptions, pack, pack_to};
pub use policy::{Modes, Owner, supports_posix_ownership};
pub use unpack::{UnpackOptions, unpack};
