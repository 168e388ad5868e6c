// src/lib.rs

//! orzecznik - CBOSA judgment pipeline library

pub mod error;
pub mod models;
pub mod pipeline;
pub mod services;
pub mod utils;
