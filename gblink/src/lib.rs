//! Linking and code layout core for a banked-memory assembler.
//!
//! The front end parses source files into [`source::SourceFile`] structures;
//! this crate expands macros, lays the entries out across memory segments
//! and banks, resolves symbolic references to concrete values, validates
//! encoding ranges and runs a peephole optimizer that re-triggers layout
//! when it shrinks instructions.
//!
//! The pipeline is [`linker::init`] once per file, then [`linker::link`],
//! then optionally [`linker::optimize`] followed by another [`linker::link`]
//! to re-resolve distances.

pub mod binary;
pub mod data;
pub mod error;
pub mod expr;
pub mod inst;
pub mod label;
pub mod linker;
pub mod macros;
pub mod optimizer;
pub mod resolver;
pub mod section;
pub mod source;

pub use error::{Error, ErrorKind, Pos};
pub use linker::LinkContext;
