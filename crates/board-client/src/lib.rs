//! Client side of the board: a typed HTTP client and a reducer-style view
//! store that any front end can drive.

pub mod client;
pub mod error;
pub mod store;

pub use client::BoardClient;
pub use error::ClientError;
pub use store::{Action, BoardState, Store, reduce};
