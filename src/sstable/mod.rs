pub mod block;
pub mod builder;
pub mod footer;
pub mod reader;

pub use builder::TableBuilder;
pub use reader::{Table, TableIterator};
