pub mod contacts;
pub mod locks;
pub mod mutator;
pub mod query;

pub use contacts::*;
pub use locks::*;
pub use mutator::*;
pub use query::*;
