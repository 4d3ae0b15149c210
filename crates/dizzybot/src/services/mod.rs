pub mod commands;
pub mod conversation;
pub mod dispatcher;
pub mod generation;
pub mod palm;

pub use commands::ChatPolicy;
pub use dispatcher::Dispatcher;
pub use generation::{GenerationClient, GenerationOptions};
pub use palm::{MessageGenerator, PalmClient};
