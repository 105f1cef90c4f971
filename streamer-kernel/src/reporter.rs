use std::rc::Rc;

/// Observable events a streamer stage reports to whatever owns the pipeline.
///
/// Conventions (see spec §4.1): `Event` values include `"handshake"`,
/// `"publish"`, `"close"`; `Error` carries a free-form description;
/// `VideoStatics`/`AudioStatics` carry a JSON-object payload with
/// `kbps, pps, rtt, jitter, lost, resend total, resend pps`.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum ReportType {
    Event,
    Error,
    VideoStatics,
    AudioStatics,
}

impl ReportType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReportType::Event => "event",
            ReportType::Error => "error",
            ReportType::VideoStatics => "video_statics",
            ReportType::AudioStatics => "audio_statics",
        }
    }
}

/// A single callback `(streamer_name, event_type, value)` installed on a
/// streamer via `set_reporter`.
pub trait Reporter {
    fn report(&self, streamer_name: &str, report_type: ReportType, value: &str);
}

pub type SharedReporter = Rc<dyn Reporter>;

/// A reporter that forwards to the `log` facade at the matching level,
/// used as the default when no caller-supplied reporter is installed —
/// this is the Rust-idiomatic equivalent of the source's null-tolerant
/// logger pointers (Open Question 1, see DESIGN.md).
pub struct LogReporter;

impl Reporter for LogReporter {
    fn report(&self, streamer_name: &str, report_type: ReportType, value: &str) {
        match report_type {
            ReportType::Error => log::error!("[{streamer_name}] {value}"),
            ReportType::Event => log::info!("[{streamer_name}] {value}"),
            ReportType::VideoStatics | ReportType::AudioStatics => {
                log::debug!("[{streamer_name}] {}: {value}", report_type.as_str())
            }
        }
    }
}
