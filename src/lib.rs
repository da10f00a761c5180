pub mod aggregate;
pub mod config;
pub mod error;
pub mod message;
pub mod relay;
pub mod sink;
pub mod source;
pub mod window;

pub use config::RelayConfig;
pub use error::RelayError;
pub use message::Message;
pub use relay::ShutdownGate;
pub use window::Window;
