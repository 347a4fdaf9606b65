use chrono::{DateTime, Local, NaiveDateTime, Utc};

/// Injectable time source. Scheduling math runs on local wall-clock time
/// (business hours are a local policy); persisted records carry UTC.
pub trait Clock: Send + Sync {
    fn now_utc(&self) -> DateTime<Utc>;
    fn now_local(&self) -> NaiveDateTime;
}

#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_utc(&self) -> DateTime<Utc> {
        Utc::now()
    }

    fn now_local(&self) -> NaiveDateTime {
        Local::now().naive_local()
    }
}

/// Deterministic clock for tests.
#[derive(Clone, Copy, Debug)]
pub struct FixedClock {
    pub local: NaiveDateTime,
}

impl FixedClock {
    pub fn at(local: NaiveDateTime) -> Self {
        Self { local }
    }
}

impl Clock for FixedClock {
    fn now_utc(&self) -> DateTime<Utc> {
        self.local.and_utc()
    }

    fn now_local(&self) -> NaiveDateTime {
        self.local
    }
}
