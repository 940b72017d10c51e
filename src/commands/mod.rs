//! Command implementations for the mpas CLI

pub mod bootstrap;
pub mod resolve;
pub mod version;
