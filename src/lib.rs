pub mod config;
pub mod pipeline;
pub mod pose;
pub mod render;
