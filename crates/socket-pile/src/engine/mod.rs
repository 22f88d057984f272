pub mod acceptor;
pub mod endpoint;
pub mod piler;
pub mod waitgroup;
