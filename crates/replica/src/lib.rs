//! Replica: fault-tolerant page capture and chunked HTML clone assembly.
//!
//! [`capture::CaptureEngine`] turns a URL into a [`PageContext`] without ever
//! failing, [`assemble::Assembler`] turns that context into one HTML document
//! through a text-generation [`backend::Generator`], and [`pipeline::Cloner`]
//! runs the two back to back.

pub mod assemble;
pub mod backend;
pub mod capture;
pub mod config;
pub mod pipeline;
pub mod text;
pub mod types;

pub use assemble::{Assembler, Assembly};
pub use backend::{ChatCompletionsClient, Generator, Retrying};
pub use capture::{CaptureEngine, CaptureFrame, CaptureStrategy, Captured, STUB_PAGE};
pub use config::ReplicaConfig;
pub use pipeline::Cloner;
pub use types::*;
