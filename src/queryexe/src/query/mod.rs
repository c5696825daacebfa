pub use executor::{Executor, PhysicalPlan};
mod executor;
