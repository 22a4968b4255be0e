pub mod aggregate;
pub mod common;
pub mod error;
pub mod row;
pub mod schema;
pub mod table;

pub use aggregate::*;
pub use common::*;
pub use error::*;
pub use row::*;
pub use schema::*;
pub use table::*;
