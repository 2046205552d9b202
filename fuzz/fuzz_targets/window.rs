#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use seqwin::config::WindowConfig;
use seqwin::window::ReceiverWindow;
use web_time::Instant;

#[derive(Debug, Arbitrary)]
enum Op {
    Arrive { seq: u32, delay_ms: u8 },
    Drop { lo: u32, hi: u32 },
    Clear,
}

#[derive(Debug, Arbitrary)]
struct Input {
    window_size: u8,
    ops: Vec<Op>,
}

fuzz_target!(|input: Input| {
    let window_size = u32::from(input.window_size).max(1);
    let config = WindowConfig {
        window_size,
        initial_sequence: 0,
        max_sequence: u64::from(window_size) * 4,
        max_delay_ms: 0,
    };
    let Ok(mut window) = ReceiverWindow::<u8>::new(&config) else {
        return;
    };

    let start = Instant::now();
    for op in input.ops {
        match op {
            Op::Arrive { seq, delay_ms } => {
                let now = start + std::time::Duration::from_millis(u64::from(delay_ms));
                window.arrived_packet(now, seq, now, 0);
            }
            Op::Drop { lo, hi } => {
                window.drop(lo, hi);
            }
            Op::Clear => {
                window.clear();
            }
        }
        window.check_invariants().expect("window invariant violated");
        assert!(window.size() <= window.capacity());
    }
});
