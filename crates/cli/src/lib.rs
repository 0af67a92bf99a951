//! `wmpf-bridge`: run the miniapp DevTools bridge from a terminal.

pub mod cli;
pub mod commands;
pub mod config;
pub mod error;
pub mod logging;
pub mod output;
