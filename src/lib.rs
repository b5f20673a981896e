#![forbid(unsafe_code)]

pub mod assemble;
pub mod cli;
pub mod config;
pub mod diagram;
pub mod export;
pub mod formats;
pub mod front_matter;
pub mod gather;
pub mod logging;
pub mod pdf;
pub mod render;
pub mod scan;
pub mod wizard;
