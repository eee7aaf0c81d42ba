pub mod config;
pub mod credentials;
pub mod errors;
pub mod geocode;
pub mod models;
pub mod transport;
pub mod uploader;

#[cfg(test)]
mod testing;
