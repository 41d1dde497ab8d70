pub mod backend;
pub mod config;
pub mod errors;
pub mod grabs;
mod handlers;
pub mod input;
pub mod layout;
pub mod protocols;
pub mod shell;
pub mod state;
pub mod tree;
pub mod utils;
pub mod view;


pub use errors::{CompositorError, Result};
pub use state::Nora;
