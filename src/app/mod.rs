//! Console state and actions

mod action;
mod state;

pub use action::{Action, parse_mask};
pub use state::AppState;
