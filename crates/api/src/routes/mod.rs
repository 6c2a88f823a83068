//! Route Handlers

pub mod device;
pub mod settings;
pub mod sleep;
