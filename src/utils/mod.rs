//! Utils module - logging setup, keyed locks, file and string helpers

pub mod fs;
pub mod locks;
pub mod logging;
pub mod string;

pub use locks::KeyedLocks;
