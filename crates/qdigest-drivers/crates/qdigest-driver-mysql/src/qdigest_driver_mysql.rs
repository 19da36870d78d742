//! MySQL source driver
//!
//! Each [`MySqlConnection`] owns exactly one `mysql_async::Conn`. There is no
//! pool: the pipeline opens one administrative and one application session.

mod connection;
#[cfg(test)]
mod connection_tests;
mod driver;

pub use connection::MySqlConnection;
pub use driver::MySqlDriver;
