// src/services/mod.rs

pub mod grading;
pub mod notify;
pub mod session;
