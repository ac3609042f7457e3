pub mod readers;

pub use readers::{Enumeration, UnitSource};
