pub mod chat;
pub mod config;
pub mod health;
pub mod threads;
pub mod utils;

#[cfg(test)]
pub(crate) mod test_support;
