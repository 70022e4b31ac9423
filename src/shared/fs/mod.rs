pub mod local;

pub use local::{LocalFile, LocalFs};
