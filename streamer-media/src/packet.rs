use std::collections::HashMap;

use crate::ByteBuf;

/// The kind of elementary content a [`MediaPacket`] carries.
#[derive(Debug, Default, Copy, Clone, Eq, PartialEq, Hash)]
pub enum AvType {
    #[default]
    Unknown,
    Video,
    Audio,
    Metadata,
}

/// Elementary codec of a video/audio [`MediaPacket`].
#[derive(Debug, Default, Copy, Clone, Eq, PartialEq, Hash)]
pub enum CodecType {
    #[default]
    Unknown,
    H264,
    H265,
    Vp8,
    Vp9,
    Aac,
    Opus,
    Mp3,
}

/// Container framing that `buffer` is expressed in. `Raw` means elementary
/// frames: Annex-B NAL units for video, bare Opus frames for audio.
#[derive(Debug, Default, Copy, Clone, Eq, PartialEq, Hash)]
pub enum FormatType {
    #[default]
    Unknown,
    Raw,
    Flv,
    MpegTs,
    Rtmp,
}

/// The universal in-flight unit passed between streamer stages.
///
/// Invariants (enforced by constructors/setters, not re-checked on every
/// field read): a sequence header is never also a key frame; `pts >= dts`;
/// metadata packets carry a metadata type and key/value map with the AMF0
/// bytes in `buffer`.
#[derive(Clone)]
pub struct MediaPacket {
    pub av_type: AvType,
    pub codec_type: CodecType,
    pub format_type: FormatType,
    pub dts: i64,
    pub pts: i64,
    pub is_key_frame: bool,
    pub is_seq_hdr: bool,
    pub buffer: ByteBuf,

    pub metadata_type: i32,
    pub metadata: HashMap<String, String>,

    pub sample_rate: u32,
    pub sample_size: u8,
    pub channels: u8,

    // routing tags (vhost_appname_streamname conventions from the
    // RTMP/WHIP ingest boundary)
    pub key: String,
    pub vhost: String,
    pub app: String,
    pub stream_name: String,
    pub stream_id: u32,
    pub type_id: u8,
}

impl MediaPacket {
    pub fn new() -> Self {
        Self {
            av_type: AvType::Unknown,
            codec_type: CodecType::Unknown,
            format_type: FormatType::Unknown,
            dts: -1,
            pts: -1,
            is_key_frame: false,
            is_seq_hdr: false,
            buffer: ByteBuf::new(),
            metadata_type: 0,
            metadata: HashMap::new(),
            sample_rate: 44_100,
            sample_size: 1,
            channels: 2,
            key: String::new(),
            vhost: String::new(),
            app: String::new(),
            stream_name: String::new(),
            stream_id: 0,
            type_id: 0,
        }
    }

    /// Independent deep copy: new backing storage, same property values.
    pub fn copy(&self) -> Self {
        let mut cloned = self.clone();
        cloned.buffer = self.buffer.deep_clone();
        cloned
    }

    /// Copy every property except the buffer from `other` into `self`,
    /// matching the source's `copy_properties` helper used when retagging
    /// a packet for a different sink without touching its payload.
    pub fn copy_properties_from(&mut self, other: &MediaPacket) {
        self.av_type = other.av_type;
        self.codec_type = other.codec_type;
        self.format_type = other.format_type;
        self.dts = other.dts;
        self.pts = other.pts;
        self.is_key_frame = other.is_key_frame;
        self.is_seq_hdr = other.is_seq_hdr;
        self.key = other.key.clone();
        self.vhost = other.vhost.clone();
        self.app = other.app.clone();
        self.stream_name = other.stream_name.clone();
        self.stream_id = other.stream_id;
        self.type_id = other.type_id;
    }

    pub fn is_video(&self) -> bool {
        self.av_type == AvType::Video
    }

    pub fn is_audio(&self) -> bool {
        self.av_type == AvType::Audio
    }

    pub fn is_metadata(&self) -> bool {
        self.av_type == AvType::Metadata
    }
}

impl Default for MediaPacket {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for MediaPacket {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "MediaPacket {{ av_type: {:?}, codec_type: {:?}, format_type: {:?}, dts: {}, pts: {}, \
key_frame: {}, seq_hdr: {}, len: {} }}",
            self.av_type,
            self.codec_type,
            self.format_type,
            self.dts,
            self.pts,
            self.is_key_frame,
            self.is_seq_hdr,
            self.buffer.data_len(),
        )
    }
}
