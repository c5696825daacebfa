#[macro_use]
extern crate log;

pub mod channel;
pub mod interpreter;
pub mod opiterator;
pub mod query;
pub mod scalar;

pub use channel::{channel, CancelHandle, Sink, Source};
pub use interpreter::Interpreter;
pub use query::{Executor, PhysicalPlan};
pub use scalar::{Scalar, ScalarCompiler};
