#![warn(rust_2018_idioms)]

mod factory;
mod reporter;
mod streamer;

pub use factory::{Factory, StreamerCtor, register_streamer};
pub use reporter::{LogReporter, ReportType, Reporter, SharedReporter};
pub use streamer::{
    EventLoopHandle, OptionTable, SharedEventLoop, SharedStreamer, SinkTable, Streamer,
    StreamerBase, WeakStreamer,
};
