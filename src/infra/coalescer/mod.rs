//! Canonical coalescer adapter.

pub mod stacker;

pub use stacker::StackerCoalescer;
