#![warn(rust_2018_idioms)]
pub mod collaborators;
pub mod config;
pub mod inventory;
pub mod service;
pub mod utils;
