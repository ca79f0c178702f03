pub mod connection;
pub mod result;
pub mod turn;

pub use connection::ConnectionConfig;
pub use result::{QueryResult, ResultSet};
pub use turn::{Role, Turn};
