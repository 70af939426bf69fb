//! Host bridge between the frame services and the UI shell.

pub mod contract;
pub mod handler;
pub mod stdio;
