// Fork runtime linked into every generated harness. Standard library only.
//
// Speaks the worker side of the hotbench line protocol on stdin/stdout.

use std::io::{self, BufRead, Write};
use std::panic::{self, AssertUnwindSafe};
use std::time::{Duration, Instant};

const PREFIX: &str = "@hotbench";
const PROTOCOL_VERSION: u32 = 1;
const FORK_FLAG: &str = "--hotbench-fork";
const HINTS_ENV: &str = "HOTBENCH_COMPILER_HINTS";
const MAX_BATCH: u64 = 1 << 24;

pub struct Benchmark {
    pub id: &'static str,
    pub run: fn(u64, bool),
}

#[inline(never)]
pub fn measure_opaque<R>(ops: u64, body: fn() -> R) {
    let body = std::hint::black_box(body);
    for _ in 0..ops {
        std::hint::black_box(body());
    }
}

pub fn main(benchmarks: &[Benchmark]) -> i32 {
    let mode = std::env::args().nth(1);
    match mode.as_deref() {
        Some(FORK_FLAG) => serve(benchmarks),
        Some("--list") => {
            for benchmark in benchmarks {
                println!("{}", benchmark.id);
            }
            0
        }
        _ => {
            eprintln!("this executable is a hotbench harness and is driven by the hotbench runner");
            2
        }
    }
}

fn send(message: &str) {
    let stdout = io::stdout();
    let mut out = stdout.lock();
    // Leading break: benchmark output may have left the line unterminated.
    let _ = write!(out, "\n{} {}\n", PREFIX, message);
    let _ = out.flush();
}

fn escape(message: &str) -> String {
    let mut out = String::with_capacity(message.len());
    for c in message.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            c => out.push(c),
        }
    }
    out
}

fn dont_inline_targets() -> Vec<String> {
    let raw = std::env::var(HINTS_ENV).unwrap_or_default();
    let mut targets: Vec<String> = Vec::new();
    for hint in raw.split(';').filter(|h| !h.is_empty()) {
        if let Some((directive, target)) = hint.split_once('=') {
            targets.retain(|t| t != target);
            if directive == "dontinline" {
                targets.push(target.to_string());
            }
        }
    }
    targets
}

fn hint_count() -> usize {
    std::env::var(HINTS_ENV)
        .unwrap_or_default()
        .split(';')
        .filter(|h| !h.is_empty())
        .count()
}

struct RunRequest {
    id: String,
    warmup_iterations: u32,
    warmup_time: Duration,
    measurement_iterations: u32,
    measurement_time: Duration,
}

fn parse_run(fields: &[&str]) -> Option<RunRequest> {
    if fields.len() != 5 {
        return None;
    }
    Some(RunRequest {
        id: fields[0].to_string(),
        warmup_iterations: fields[1].parse().ok()?,
        warmup_time: Duration::from_nanos(fields[2].parse().ok()?),
        measurement_iterations: fields[3].parse().ok()?,
        measurement_time: Duration::from_nanos(fields[4].parse().ok()?),
    })
}

fn serve(benchmarks: &[Benchmark]) -> i32 {
    let dont_inline = dont_inline_targets();
    send(&format!("hello {} {}", PROTOCOL_VERSION, hint_count()));

    let stdin = io::stdin();
    for line in stdin.lock().lines() {
        let line = match line {
            Ok(line) => line,
            Err(_) => return 1,
        };
        let body = match line.strip_prefix(PREFIX) {
            Some(body) => body.trim(),
            None => continue,
        };
        let fields: Vec<&str> = body.split_whitespace().collect();
        match fields.first().copied() {
            Some("shutdown") => return 0,
            Some("run") => match parse_run(&fields[1..]) {
                Some(request) => {
                    match benchmarks.iter().find(|b| b.id == request.id) {
                        Some(benchmark) => {
                            let opaque = dont_inline.iter().any(|t| t == benchmark.id);
                            execute(benchmark, opaque, &request);
                        }
                        None => send(&format!(
                            "failure {}",
                            escape(&format!("unknown benchmark {}", request.id))
                        )),
                    }
                }
                None => send(&format!("failure {}", escape(&format!("malformed request: {}", body)))),
            },
            _ => send(&format!("failure {}", escape(&format!("unknown command: {}", body)))),
        }
    }
    0
}

fn iteration(benchmark: &Benchmark, opaque: bool, time: Duration) -> (u64, u64) {
    let start = Instant::now();
    if time.is_zero() {
        (benchmark.run)(1, opaque);
        return (1, start.elapsed().as_nanos() as u64);
    }

    let mut ops = 0u64;
    let mut batch = 1u64;
    loop {
        (benchmark.run)(batch, opaque);
        ops += batch;
        let elapsed = start.elapsed();
        if elapsed >= time {
            return (ops, elapsed.as_nanos() as u64);
        }
        if batch < MAX_BATCH {
            batch *= 2;
        }
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "benchmark panicked".to_string()
    }
}

fn execute(benchmark: &Benchmark, opaque: bool, request: &RunRequest) {
    let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
        for index in 0..request.warmup_iterations {
            let (ops, nanos) = iteration(benchmark, opaque, request.warmup_time);
            send(&format!("warmup {} {} {}", index, ops, nanos));
        }
        let mut total_ops = 0u64;
        let mut total_nanos = 0u64;
        for index in 0..request.measurement_iterations {
            let (ops, nanos) = iteration(benchmark, opaque, request.measurement_time);
            send(&format!("measure {} {} {}", index, ops, nanos));
            total_ops += ops;
            total_nanos += nanos;
        }
        (total_ops, total_nanos)
    }));

    match outcome {
        Ok((ops, nanos)) => send(&format!("complete {} {}", ops, nanos)),
        Err(payload) => send(&format!("failure {}", escape(&panic_message(payload.as_ref())))),
    }
}
