pub mod controller;
pub mod decode;
pub mod replay;

pub use controller::{HeartRateSession, ReadingSubscriber};
