#![warn(rust_2018_idioms)]

pub mod application_defined;
pub mod extended_report;
pub mod goodbye;
pub mod header;
pub mod packet;
pub mod picture_loss_indication;
pub mod receiver_report;
pub mod reception_report;
pub mod sender_report;
pub mod source_description;
pub mod transport_layer_nack;

pub use application_defined::ApplicationDefined;
pub use extended_report::{DlrrReport, ExtendedReport, XrBlock};
pub use goodbye::Goodbye;
pub use header::Header;
pub use packet::{marshal_compound, unmarshal_compound, Packet};
pub use picture_loss_indication::PictureLossIndication;
pub use receiver_report::ReceiverReport;
pub use reception_report::ReceptionReport;
pub use sender_report::SenderReport;
pub use source_description::{SdesChunk, SdesItem, SourceDescription};
pub use transport_layer_nack::{NackPair, TransportLayerNack};
