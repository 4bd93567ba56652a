pub mod client;
pub mod pacer;

pub use client::MexcClient;
