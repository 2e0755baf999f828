// Lookups over the symbol index

pub mod engine;

pub use engine::{DisplayEntry, QueryEngine};
