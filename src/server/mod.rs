pub mod client_handler;
pub mod handler;
pub mod tcp_server;
