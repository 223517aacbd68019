#![fork(1)]
#![warmup(iterations = 1)]
#![measurement(iterations = 1)]

use std::time::Duration;

#[benchmark]
pub fn benchmark() {
    std::thread::park_timeout(Duration::from_nanos(1));
}
