#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use seqwin::timer::DeadlineTimer;
use std::time::Duration;
use web_time::Instant;

#[derive(Debug, Arbitrary)]
enum Op {
    Schedule { key: u8, delay_ms: u16 },
    Cancel { key: u8 },
    Advance { step_ms: u16 },
}

fuzz_target!(|ops: Vec<Op>| {
    let mut timer: DeadlineTimer<u8, ()> = DeadlineTimer::new();
    timer.set_on_expired::<_, std::convert::Infallible>(|_k, ()| Ok(()));

    let start = Instant::now();
    let mut now = start;
    for op in ops {
        match op {
            Op::Schedule { key, delay_ms } => {
                timer.schedule(now, Duration::from_millis(u64::from(delay_ms)), key, ());
            }
            Op::Cancel { key } => {
                timer.cancel(&key);
            }
            Op::Advance { step_ms } => {
                now += Duration::from_millis(u64::from(step_ms));
                timer.advance(now);
            }
        }
        assert!(timer.len() <= u8::MAX as usize + 1);
    }
});
