#![doc = include_str!("../README.md")]

mod batch;
mod config;
mod dispatcher;
mod error;
mod generator;
pub mod queue;
mod runner;
mod worker;

pub use crate::batch::*;
pub use crate::config::*;
pub use crate::dispatcher::*;
pub use crate::error::*;
pub use crate::generator::*;
pub use crate::runner::*;
pub use crate::worker::*;
