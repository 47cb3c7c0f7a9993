//! Command implementations.

pub mod keygen;
pub mod sign;
pub mod submit;
