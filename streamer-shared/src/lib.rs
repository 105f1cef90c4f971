#![warn(rust_2018_idioms)]
#![allow(dead_code)]

pub mod error;
pub mod time;
pub mod transport;
pub mod util;

pub use error::{Error, Result};
pub use time::SystemInstant;
pub use transport::{FiveTuple, FourTuple, TransportContext, TransportProtocol};
