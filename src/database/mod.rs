pub mod sqlite;

pub use sqlite::{Database, DbPool, PageContextQueries, ProductQueries};
