use std::{fmt, sync::Arc};

use chrono::{DateTime, NaiveDate, Utc};

/// Clock abstracts access to the current timestamp so the engine stays deterministic in tests.
pub trait Clock: Send + Sync {
    /// Returns the current UTC timestamp.
    fn now(&self) -> DateTime<Utc>;

    /// Returns the current UTC date. Defaults to `now().date_naive()`.
    fn today(&self) -> NaiveDate {
        self.now().date_naive()
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Clock pinned to one instant.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock {
    instant: DateTime<Utc>,
}

impl FixedClock {
    pub fn new(instant: DateTime<Utc>) -> Self {
        Self { instant }
    }

    /// Midnight UTC on `date`.
    pub fn on(date: NaiveDate) -> Self {
        Self::new(date.and_time(chrono::NaiveTime::MIN).and_utc())
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.instant
    }
}

/// Per-session state handed to the engine explicitly.
#[derive(Clone)]
pub struct SessionContext {
    pub user: String,
    pub clock: Arc<dyn Clock>,
}

impl SessionContext {
    pub fn new(user: impl Into<String>, clock: Arc<dyn Clock>) -> Self {
        Self {
            user: user.into(),
            clock,
        }
    }

    pub fn system(user: impl Into<String>) -> Self {
        Self::new(user, Arc::new(SystemClock))
    }

    pub fn today(&self) -> NaiveDate {
        self.clock.today()
    }
}

impl fmt::Debug for SessionContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionContext")
            .field("user", &self.user)
            .field("today", &self.today())
            .finish()
    }
}
