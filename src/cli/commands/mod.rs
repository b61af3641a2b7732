pub mod config;
pub mod crosscheck;
pub mod generate;
pub mod health;
pub mod render;
pub mod review;
pub mod templates;
