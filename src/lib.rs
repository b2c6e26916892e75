pub mod catalog;
pub mod config;
pub mod domain;
pub mod error;
pub mod fetch;
pub mod fs_util;
pub mod logging;
pub mod metadata;
pub mod output;
pub mod pipeline;
pub mod render;
pub mod repository;
