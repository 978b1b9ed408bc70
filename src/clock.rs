use chrono::NaiveDateTime;

/// Source of "now" for every scheduling decision. Times are clinic wall-clock.
pub trait Clock: Send + Sync {
    fn now(&self) -> NaiveDateTime;
}

pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> NaiveDateTime {
        chrono::Local::now().naive_local()
    }
}

/// Frozen clock for tests and replays.
pub struct FixedClock(pub NaiveDateTime);

impl FixedClock {
    pub fn parse(s: &str) -> anyhow::Result<Self> {
        Ok(Self(NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M")?))
    }
}

impl Clock for FixedClock {
    fn now(&self) -> NaiveDateTime {
        self.0
    }
}
