pub mod connection;
pub mod dispatcher;
pub mod error;
pub mod hub;
pub mod socket;
pub mod typing;

pub use dispatcher::Dispatcher;
pub use error::RelayError;
pub use hub::Hub;
