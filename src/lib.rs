pub mod auth;
pub mod cli;
pub mod config;
pub mod database;
pub mod error;
pub mod filter;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod observer;
pub mod services;
pub mod state;
pub mod types;

#[cfg(test)]
pub mod testing;
