#![warn(rust_2018_idioms)]

mod config;
mod jitter_buffer;
mod kind;
mod nack_generator;
mod peer_connection;
mod receive_stream;
mod send_stream;
mod seq_state;
mod signaling;
mod state;

pub use config::PeerConnectionConfig;
pub use kind::MediaKind;
pub use peer_connection::{PeerConnection, Transmit};
pub use signaling::{
    mediasoup_publish, whep_play, whip_publish, Broadcaster, HttpResponse, HttpTransport, ProduceRequest, Producer,
    WebrtcTransport,
};
pub use state::PeerConnectionState;
