use {
    chrono::{DateTime, Utc},
    std::fmt::Debug,
};

/// Source of the current time. Injected wherever freshness gets decided so
/// tests can move time forward without sleeping.
pub trait Clock: Debug + Send + Sync + 'static {
    fn now(&self) -> DateTime<Utc>;
}

/// The wall clock.
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

#[cfg(any(test, feature = "test-util"))]
pub use fake::FakeClock;

#[cfg(any(test, feature = "test-util"))]
mod fake {
    use {
        super::Clock,
        chrono::{DateTime, Utc},
        std::{sync::Mutex, time::Duration},
    };

    /// A clock that only moves when told to.
    #[derive(Debug)]
    pub struct FakeClock(Mutex<DateTime<Utc>>);

    impl FakeClock {
        pub fn new(start: DateTime<Utc>) -> Self {
            Self(Mutex::new(start))
        }

        pub fn advance(&self, duration: Duration) {
            let mut now = self.0.lock().unwrap();
            *now += chrono::Duration::from_std(duration).unwrap();
        }
    }

    impl Default for FakeClock {
        fn default() -> Self {
            Self::new(DateTime::UNIX_EPOCH)
        }
    }

    impl Clock for FakeClock {
        fn now(&self) -> DateTime<Utc> {
            *self.0.lock().unwrap()
        }
    }
}
