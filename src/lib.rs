//! riskreg: a risk and controls register kept in a single spreadsheet
//! document.
//!
//! The document is decoded into an in-memory register, edited through a
//! cached persistence provider, and encoded back whole on every write.

pub mod cli;
pub mod codec;
pub mod core;
pub mod entities;
pub mod store;
