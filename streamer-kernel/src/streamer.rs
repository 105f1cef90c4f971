use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::{Rc, Weak};

use streamer_media::MediaPacket;
use streamer_shared::{Error, Result};

use crate::reporter::{LogReporter, SharedReporter};

/// Marker for whatever event-loop the caller's transport runs on. A
/// streamer that receives `None` in `start_network` owns its own thread
/// and loop instead of attaching to a shared one (spec §4.1).
pub trait EventLoopHandle {}

pub type SharedEventLoop = Rc<dyn EventLoopHandle>;
pub type SharedStreamer = Rc<RefCell<dyn Streamer>>;
pub type WeakStreamer = Weak<RefCell<dyn Streamer>>;

/// A named, stateful pipeline node. Every concrete stage (SDP transform,
/// RTP send/receive stream, a demuxer adapter, …) implements this trait;
/// the pipeline drives every node identically through the six operations.
pub trait Streamer {
    /// Stable unique identifier assigned at construction.
    fn name(&self) -> &str;

    /// Register `sink` to receive packets this streamer produces. Keyed by
    /// `sink.name()`; calling this again with the same name replaces the
    /// existing entry instead of erroring.
    fn add_sink(&mut self, sink: SharedStreamer);

    /// Remove a sink by name. No-op if absent.
    fn remove_sink(&mut self, name: &str);

    /// Stage-specific processing of one packet. May forward zero or more
    /// packets to each registered sink.
    fn source_data(&mut self, pkt: MediaPacket) -> Result<()>;

    /// Begin I/O against `url`. If `event_loop` is `None` the stage owns
    /// an internal thread and loop.
    fn start_network(&mut self, url: &str, event_loop: Option<SharedEventLoop>) -> Result<()>;

    /// Set a configuration option. Only keys present in the stage's
    /// declared defaults are accepted.
    fn add_option(&mut self, key: &str, value: &str) -> Result<()>;

    /// Install the async event sink used for `report`.
    fn set_reporter(&mut self, reporter: SharedReporter);
}

/// Sink bookkeeping shared by every concrete streamer: a name-keyed map of
/// weak references to downstream peers. Weak, because the pipeline owns
/// strong references and a streamer must never keep a sink alive past the
/// pipeline tearing it down.
#[derive(Default)]
pub struct SinkTable {
    sinks: HashMap<String, WeakStreamer>,
}

impl SinkTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, sink: &SharedStreamer) {
        let name = sink.borrow().name().to_string();
        self.sinks.insert(name, Rc::downgrade(sink));
    }

    pub fn remove(&mut self, name: &str) {
        self.sinks.remove(name);
    }

    pub fn len(&self) -> usize {
        self.sinks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }

    /// Push `pkt` to every live sink, pruning any that have since been
    /// dropped. Each sink gets an independent deep copy, matching the
    /// source's fan-out-by-copy semantics for shared buffers.
    pub fn fan_out(&mut self, pkt: &MediaPacket) -> Result<()> {
        let mut dead = Vec::new();
        for (name, weak) in self.sinks.iter() {
            match weak.upgrade() {
                Some(sink) => sink.borrow_mut().source_data(pkt.copy())?,
                None => dead.push(name.clone()),
            }
        }
        for name in dead {
            self.sinks.remove(&name);
        }
        Ok(())
    }
}

/// Declared-default-driven option map: `add_option` only accepts keys
/// already present (with their default value) in the table.
#[derive(Default, Clone)]
pub struct OptionTable {
    values: HashMap<String, String>,
}

impl OptionTable {
    /// Build a table seeded with a stage's declared defaults.
    pub fn with_defaults<const N: usize>(defaults: [(&str, &str); N]) -> Self {
        let mut values = HashMap::new();
        for (k, v) in defaults {
            values.insert(k.to_string(), v.to_string());
        }
        Self { values }
    }

    pub fn set(&mut self, key: &str, value: &str) -> Result<()> {
        if !self.values.contains_key(key) {
            return Err(Error::ErrUnknownOption(key.to_string()));
        }
        self.values.insert(key.to_string(), value.to_string());
        Ok(())
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }
}

/// Common state every concrete `Streamer` impl composes by value and
/// delegates to, rather than inheriting — the trait carries no default
/// method bodies because it has no fields of its own to act on.
pub struct StreamerBase {
    name: String,
    pub sinks: SinkTable,
    pub options: OptionTable,
    pub reporter: SharedReporter,
}

impl StreamerBase {
    /// `base` is the stage kind (e.g. `"rtmp_publisher"`); the stable name
    /// is `base` plus a random suffix, matching the source's
    /// base-plus-UUID naming.
    pub fn new(base: &str, defaults: OptionTable) -> Self {
        let suffix = streamer_shared::util::math_rand_alpha_number(8);
        Self {
            name: format!("{base}_{suffix}"),
            sinks: SinkTable::new(),
            options: defaults,
            reporter: Rc::new(LogReporter),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}
