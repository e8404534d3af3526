//! Shared normalizers for raw query-string filter values.

pub mod normalizers;

pub use normalizers::*;
