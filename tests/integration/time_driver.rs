//! Wall-clock time driver for `async_io_mini::Timer` on the host.
//!
//! On the device the ESP-IDF timer service provides it; here each wake is
//! a sleeping thread.

use std::sync::OnceLock;
use std::task::Waker;
use std::thread;
use std::time::{Duration, Instant};

use embassy_time_driver::{Driver, TICK_HZ};

struct StdDriver;

static START: OnceLock<Instant> = OnceLock::new();

fn ticks_to_duration(ticks: u64) -> Duration {
    let micros = u128::from(ticks) * 1_000_000 / u128::from(TICK_HZ);
    Duration::from_micros(u64::try_from(micros).unwrap_or(u64::MAX))
}

impl Driver for StdDriver {
    fn now(&self) -> u64 {
        let elapsed = START.get_or_init(Instant::now).elapsed();
        (elapsed.as_micros() * u128::from(TICK_HZ) / 1_000_000) as u64
    }

    fn schedule_wake(&self, at: u64, waker: &Waker) {
        if at == u64::MAX {
            return;
        }
        let now = self.now();
        if at <= now {
            waker.wake_by_ref();
            return;
        }
        let delay = ticks_to_duration(at - now);
        let waker = waker.clone();
        thread::spawn(move || {
            thread::sleep(delay);
            waker.wake();
        });
    }
}

embassy_time_driver::time_driver_impl!(static DRIVER: StdDriver = StdDriver);
