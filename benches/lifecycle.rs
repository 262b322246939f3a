#![allow(unused)]
extern crate managed_thread;

use criterion::{criterion_group, criterion_main, Criterion};
use managed_thread::{sync::CriticalSection, sync::WaitableEvent, ManagedThread, ThreadRef};
use std::{hint::black_box, sync::Arc};

/// Benchmark a full start/stop cycle of a cooperative worker
///
/// Covers native thread creation, the startup gate, registry bookkeeping and the exit poll.
fn bench_start_stop(c: &mut Criterion) {
    let worker = ManagedThread::new("bench-worker", |thread: &ThreadRef| {
        while !thread.thread_should_exit() {
            thread.wait(-1);
        }
    })
    .unwrap();

    c.bench_function("start_stop_cycle", |b| {
        b.iter(|| {
            worker.start().unwrap();
            black_box(worker.stop(1000).unwrap())
        });
    });
}

/// Benchmark the event in isolation and as a ping-pong between two threads
fn bench_event(c: &mut Criterion) {
    let event = WaitableEvent::new(false);
    c.bench_function("event_signal_wait", |b| {
        b.iter(|| {
            event.signal();
            black_box(event.wait(-1))
        });
    });

    let ping = Arc::new(WaitableEvent::new(false));
    let pong = Arc::new(WaitableEvent::new(false));
    let responder = {
        let ping = Arc::clone(&ping);
        let pong = Arc::clone(&pong);
        ManagedThread::builder()
            .name("bench-pong")
            .spawn(move |thread: &ThreadRef| loop {
                ping.wait(-1);
                if thread.thread_should_exit() {
                    break;
                }
                pong.signal();
            })
            .unwrap()
    };

    c.bench_function("event_ping_pong", |b| {
        b.iter(|| {
            ping.signal();
            black_box(pong.wait(-1))
        });
    });

    responder.request_stop();
    ping.signal();
    responder.wait_for_exit(1000).unwrap();
}

/// Benchmark reentrant acquisition of a critical section
fn bench_critical_section(c: &mut Criterion) {
    let section = CriticalSection::new(0u64);
    c.bench_function("critical_section_nested_lock", |b| {
        b.iter(|| {
            let outer = section.lock();
            let inner = section.lock();
            black_box(*outer + *inner)
        });
    });
}

criterion_group!(
    benches,
    bench_start_stop,
    bench_event,
    bench_critical_section
);
criterion_main!(benches);
