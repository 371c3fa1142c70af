//! Scene processor service.
//!
//! Wraps the scene pipeline in the invocation contract: an event with a
//! date range goes in, a status code and JSON body come out. Runs either
//! once from the command line or behind a small HTTP API.

pub mod config;
pub mod invocation;
pub mod server;

pub use config::ProcessorConfig;
pub use invocation::{DeploymentInfo, InvocationEvent, InvocationResponse, Processor};
pub use server::{build_router, ServerState};
