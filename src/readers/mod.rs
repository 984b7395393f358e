pub mod tabular_reader;

pub use tabular_reader::{decode_bytes, TabularParser};
