//! Session identity and on-disk layout.

mod manager;

pub use manager::Session;
