pub mod client;
pub use client::Client;

pub mod subscriber;
pub use subscriber::{Message, Subscriber};
