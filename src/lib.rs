pub mod config;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod scanner;
pub mod server;
pub mod state;
pub mod tracker;
pub mod utils;
