// src/lib.rs

//! sitescan: structural page clustering and multi-viewport site scanning

pub mod browser;
pub mod error;
pub mod models;
pub mod pipeline;
pub mod progress;
pub mod services;
pub mod storage;
pub mod utils;
