use std::ops::Add;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SystemInstant {
    instant: Instant,
    duration_since_unix_epoch: Duration,
}

impl SystemInstant {
    pub fn now() -> Self {
        Self {
            instant: Instant::now(),
            duration_since_unix_epoch: SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .unwrap_or_else(|_| Duration::from_secs(0)),
        }
    }

    pub fn duration_since_unix_epoch(&self, now: Instant) -> Duration {
        now.duration_since(self.instant)
            .add(self.duration_since_unix_epoch)
    }

    pub fn ntp(&self, now: Instant) -> u64 {
        SystemInstant::unix2ntp(self.duration_since_unix_epoch(now).as_nanos() as u64)
    }

    pub fn instant(&self, ntp: u64) -> Instant {
        let unix = SystemInstant::ntp2unix(ntp);
        let duration_since_unix_epoch =
            Duration::new(unix / 1_000_000_000, (unix % 1_000_000_000) as u32);
        self.instant + duration_since_unix_epoch - self.duration_since_unix_epoch
    }

    fn unix2ntp(u: u64) -> u64 {
        let mut s = u / 1_000_000_000;
        s += 0x83AA7E80; //offset in seconds between unix epoch and ntp epoch
        let mut f = u % 1_000_000_000;
        f <<= 32;
        f /= 1_000_000_000;
        s <<= 32;

        s | f
    }

    fn ntp2unix(t: u64) -> u64 {
        let mut s = t >> 32;
        let mut f = t & 0xFFFFFFFF;
        f *= 1_000_000_000;
        f >>= 32;
        s -= 0x83AA7E80;
        s * 1_000_000_000 + f
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ntp_roundtrip_is_stable() {
        let base = SystemInstant::now();
        let t0 = Instant::now();
        let ntp = base.ntp(t0);
        let back = base.instant(ntp);
        // sub-microsecond rounding error from the 32.32 fixed point NTP format
        let delta = if back > t0 { back - t0 } else { t0 - back };
        assert!(delta < Duration::from_micros(5));
    }

    #[test]
    fn ntp_advances_with_wallclock() {
        let base = SystemInstant::now();
        let t0 = Instant::now();
        let t1 = t0 + Duration::from_secs(1);
        assert!(base.ntp(t1) > base.ntp(t0));
    }
}
