//! PostgreSQL driver implementation

mod connection;
mod driver;
mod numeric;
mod schema;

pub use connection::PostgresConnection;
pub use driver::PostgresDriver;
pub use numeric::{decode_numeric, encode_numeric};
