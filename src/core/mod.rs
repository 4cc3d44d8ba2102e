pub mod chat_stream;
pub mod config;
pub mod conversation;
pub mod keyring;
pub mod message;
pub mod model_client;
pub mod session;
pub mod store;
pub mod thread;
