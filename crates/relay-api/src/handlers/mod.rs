//! HTTP request handlers

pub mod agents;
pub mod relay;
