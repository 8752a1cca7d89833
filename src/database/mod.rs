pub mod connection;
pub mod models;
pub mod schema;

pub use connection::{
    establish_connection_pool, DatabaseError, DatabaseHandle, PgPool, PgPooledConnection,
};
pub use models::{NewHistoryRow, StockRecord, StockUpsert};
