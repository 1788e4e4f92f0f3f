pub mod config;
pub mod conversation;
pub mod matching;
pub mod phone;
pub mod render;
pub mod session;

#[cfg(test)]
mod testing;

pub use config::*;
pub use conversation::*;
pub use matching::*;
pub use session::*;

pub use estatehub_api as api;
pub use estatehub_schema as schema;
