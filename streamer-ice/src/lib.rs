#![warn(rust_2018_idioms)]

mod keepalive;
mod message;

pub use keepalive::{IceKeepalive, RETRANSMIT_INTERVAL};
pub use message::{build_binding_request, parse_binding_success, BindingSuccess};
