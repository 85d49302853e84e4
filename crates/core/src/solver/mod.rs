//! Solver boundary.
//!
//! The engine never talks to a routing engine directly. Each chunk is turned
//! into a [`SolveRequest`] and handed to a [`SolverAdapter`], which returns
//! cost rows keyed by chunk-local ids or a classified [`SolveError`].
//!
//! [`CommandSolver`] is the stock adapter: it runs an external program per
//! chunk, speaking JSON over stdin/stdout.

mod command;
mod config;
mod error;
mod request;
mod traits;
mod types;

pub use command::CommandSolver;
pub use config::CommandSolverConfig;
pub use error::{SolveError, SolveErrorKind};
pub use request::RequestBuilder;
pub use traits::SolverAdapter;
pub use types::{
    CostRow, LocalPair, PartialResult, PreparedChunk, SolveRequest, SolveResponse, SolveSettings,
};
