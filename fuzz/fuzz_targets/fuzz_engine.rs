#![no_main]

use bia_rs::{Engine, Scheduler, Sex, TimerKind, Transport, UserProfile, UserType};
use libfuzzer_sys::fuzz_target;
use std::time::Duration;

struct Sink;

impl Transport for Sink {
    fn write(&mut self, _bytes: &[u8]) -> bool {
        true
    }
}

struct Timers;

impl Scheduler for Timers {
    fn schedule(&mut self, _timer: TimerKind, _delay: Duration) {}
    fn cancel(&mut self, _timer: TimerKind) {}
}

fuzz_target!(|data: &[u8]| {
    let Ok(profile) = UserProfile::new(Sex::Male, UserType::Normal, 175, 40, 80.0) else {
        return;
    };
    let mut engine = Engine::new(Sink, Timers);
    let _ = engine.start_measurement(profile);

    // Interleave device bytes with timer expiries
    for (i, piece) in data.chunks(7).enumerate() {
        engine.on_bytes(piece);
        let timer = if i % 2 == 0 { TimerKind::Settle } else { TimerKind::Retry };
        engine.on_timer(timer);
    }
    engine.on_disconnect();
    assert!(!engine.acquisition().is_active());
});
