//! Match candidates derived from a connection snapshot

pub mod generator;
pub mod users;

pub use generator::{CandidateGenerator, Candidates};
pub use users::{PasswdFile, UserDirectory};
