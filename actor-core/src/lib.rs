//! In-process actor runtime: address-routed message passing between
//! services hosted on a fixed pool of worker threads, coordinated by a
//! single supervisor.
//!
//! A typical embedder: [`Supervisor::boot`] a pool, register service
//! types and submit initial [`Router::new_service`] calls through
//! [`Supervisor::router`], then call [`Supervisor::run`] (blocks until
//! [`Supervisor::stop`] is called from another thread and every service
//! has drained).

pub mod address;
pub mod buffer;
pub mod container;
pub mod envelope;
mod environments;
mod error;
pub mod mailbox;
pub mod router;
pub mod service;
mod state;
pub mod supervisor;
pub mod taskqueue;
pub mod timer;
mod util;
pub mod worker;

pub use envelope::{Envelope, EnvelopeFlags, MessageType};
pub use error::{AnyError, AnyResult, RuntimeError};
pub use router::Router;
pub use service::{Service, ServiceContext};
pub use state::State;
pub use supervisor::Supervisor;
pub use timer::TimerId;
pub use worker::Worker;
