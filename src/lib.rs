// src/lib.rs

pub mod blockchain;
pub mod core;
pub mod tools;
