#![warn(rust_2018_idioms)]

mod byte_buf;
mod packet;

pub use byte_buf::{ByteBuf, DEFAULT_HEADROOM};
pub use packet::{AvType, CodecType, FormatType, MediaPacket};
