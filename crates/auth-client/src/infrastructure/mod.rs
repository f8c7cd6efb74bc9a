//! Infrastructure for the client: the TCP connection to the auth server.

pub mod network;
