pub mod api;
pub mod server;
pub mod state;

pub use api::*;
pub use server::*;
pub use state::*;
