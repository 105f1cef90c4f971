#![warn(rust_2018_idioms)]

pub mod extension;
pub mod h264;
pub mod header;
pub mod opus;
pub mod packet;
pub mod sequence;

pub use extension::Extension;
pub use h264::{H264Depacketizer, H264Packetizer, Packetized};
pub use header::Header;
pub use packet::Packet;
pub use sequence::SequenceGenerator;
