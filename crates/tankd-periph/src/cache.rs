use std::collections::HashMap;
use std::time::{Duration, Instant};

/// Per-sensor reading cache.
///
/// A reading younger than the configured lifetime is reused instead of
/// re-sampled, so request bursts don't re-touch the hardware. Callers pass
/// `now` explicitly, which keeps expiry testable without sleeping.
pub struct ReadCache {
    lifetime: Duration,
    entries: HashMap<String, (Instant, f64)>,
}

impl ReadCache {
    pub fn new(lifetime: Duration) -> Self {
        Self {
            lifetime,
            entries: HashMap::new(),
        }
    }

    /// The cached value for `name`, if it is still fresh at `now`.
    pub fn get(&self, name: &str, now: Instant) -> Option<f64> {
        let (sampled_at, value) = self.entries.get(name)?;
        if now.duration_since(*sampled_at) <= self.lifetime {
            Some(*value)
        } else {
            None
        }
    }

    /// Store a fresh sample.
    pub fn put(&mut self, name: &str, value: f64, now: Instant) {
        self.entries.insert(name.to_string(), (now, value));
    }

    pub fn lifetime(&self) -> Duration {
        self.lifetime
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_entry_is_served() {
        let mut cache = ReadCache::new(Duration::from_secs(2));
        let now = Instant::now();

        cache.put("tank_temp", 21.5, now);
        assert_eq!(cache.get("tank_temp", now), Some(21.5));
        assert_eq!(
            cache.get("tank_temp", now + Duration::from_secs(1)),
            Some(21.5)
        );
    }

    #[test]
    fn expired_entry_is_not_served() {
        let mut cache = ReadCache::new(Duration::from_secs(2));
        let now = Instant::now();

        cache.put("tank_temp", 21.5, now);
        assert_eq!(cache.get("tank_temp", now + Duration::from_secs(3)), None);
    }

    #[test]
    fn unknown_name_misses() {
        let cache = ReadCache::new(Duration::from_secs(2));
        assert_eq!(cache.get("tank_temp", Instant::now()), None);
    }

    #[test]
    fn put_refreshes_entry() {
        let mut cache = ReadCache::new(Duration::from_secs(2));
        let now = Instant::now();

        cache.put("tank_temp", 21.5, now);
        let later = now + Duration::from_secs(3);
        cache.put("tank_temp", 20.0, later);
        assert_eq!(cache.get("tank_temp", later), Some(20.0));
    }
}
