//! Typed REST client for the DemoQA Book Store flow: create account,
//! generate token, authorize, list books, reserve two against the account,
//! verify the profile. Each step's output feeds the next through an
//! explicit [`flow::FlowContext`]; nothing lives in module state.

pub mod client;
pub mod error;
pub mod flow;
pub mod models;

pub use client::BookStoreClient;
pub use error::ApiError;
pub use flow::{run_reservation_flow, Credentials, FlowContext, ReservationOutcome};
pub use models::{Book, CreatedUser, Profile, TokenResponse};
