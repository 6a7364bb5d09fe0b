//! Library crate for trivai-back, exposing modules for binaries and tests.

pub mod config;
mod dto;
mod error;
pub mod routes;
pub mod services;
pub mod state;
#[cfg(test)]
mod test_support;
