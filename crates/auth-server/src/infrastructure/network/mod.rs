//! Network infrastructure: the TCP accept loop.

pub mod acceptor;

pub use acceptor::NetworkError;
