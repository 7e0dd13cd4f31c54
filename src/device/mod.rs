pub mod adapter;
pub mod btle;
pub mod constants;
pub mod subscription;
pub mod types;
