// src/lib.rs

//! plus-sync: bilingual content synchronization and search index
//! maintenance engine.

pub mod config;
pub mod error;
pub mod models;
pub mod pipeline;
pub mod services;
pub mod storage;
