//! Data and session layer of the AutoSpot booking client.
//!
//! Everything goes through an [`AuthContext`], which owns the backend
//! handle and the signed-in session. The free functions in [`clients`],
//! [`vehicles`], [`appointments`], [`catalog`] and [`workshops`] are the
//! operations the screens call.

pub mod appointments;
pub mod auth;
pub mod backend;
pub mod catalog;
pub mod clients;
pub mod config;
pub mod error;
pub mod memory;
pub mod models;
pub mod query;
pub mod rest;
pub mod sequence;
pub mod session_store;
pub mod status;
pub mod vehicles;
pub mod workshops;

pub use auth::{AuthContext, AuthEvent, AuthSnapshot, SessionListener, Subscription};
pub use backend::{AuthApi, Backend, DataApi, SignUpOutcome};
pub use config::BackendConfig;
pub use error::{Error, Result};
pub use memory::MemoryBackend;
pub use rest::RestBackend;
pub use sequence::{Latest, Outcome, Ticket};
pub use status::{Bucket, Buckets, Stage, Timeline};
pub use workshops::{Coordinates, RankedWorkshop};
