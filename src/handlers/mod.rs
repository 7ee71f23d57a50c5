// src/handlers/mod.rs

pub mod auth;
pub mod exams;
pub mod questions;
pub mod results;
pub mod room;
