//! Core domain: token handling, credentials, sessions and storage

pub mod auth;
pub mod config;
pub mod db;
#[cfg(test)]
mod tests;
