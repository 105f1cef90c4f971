#![warn(rust_2018_idioms)]

mod constants;
mod context;
mod keys;
mod replay;
mod session;

pub use constants::{AUTH_TAG_LEN, REPLAY_WINDOW_SIZE};
pub use context::SrtpContext;
pub use keys::MasterKeys;
pub use session::SrtpSession;
