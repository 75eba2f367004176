#![deny(clippy::or_fun_call)]
#![deny(clippy::bool_to_int_with_if)]

pub mod api;
pub mod cancel;
pub mod cli;
pub mod client;
pub mod commands;
pub mod delete;
pub mod deploy;
pub mod download;
pub mod error;
pub mod features;
pub mod logging;
pub mod manifest;
pub mod model;
pub mod project;
pub mod sort;
pub mod template;
