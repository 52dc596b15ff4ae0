use std::hint::black_box;
use std::sync::Arc;
use std::thread;

use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use scq::Scq;

const OPS: u64 = 100_000;

fn single_thread(c: &mut Criterion) {
    let mut group = c.benchmark_group("single_thread");
    group.throughput(Throughput::Elements(OPS));
    for capacity in [16usize, 256, 4096] {
        let q = Scq::new(capacity);
        group.bench_with_input(BenchmarkId::new("enqueue_dequeue", capacity), &q, |b, q| {
            b.iter(|| {
                for i in 0..OPS {
                    q.enqueue(black_box(i));
                    black_box(q.dequeue());
                }
            });
        });
    }
    group.finish();
}

fn spsc(c: &mut Criterion) {
    let mut group = c.benchmark_group("spsc");
    group.throughput(Throughput::Elements(OPS));
    group.bench_function("scq_1024", |b| {
        b.iter(|| {
            let q = Arc::new(Scq::new(1024));
            let producer = {
                let q = Arc::clone(&q);
                thread::spawn(move || {
                    for i in 0..OPS {
                        while !q.enqueue(i) {
                            std::hint::spin_loop();
                        }
                    }
                })
            };
            let mut got = 0;
            while got < OPS {
                if let Some(v) = q.dequeue() {
                    black_box(v);
                    got += 1;
                }
            }
            producer.join().unwrap();
        });
    });
    group.finish();
}

fn mpmc(c: &mut Criterion) {
    let mut group = c.benchmark_group("mpmc");
    for threads in [2u64, 4] {
        group.throughput(Throughput::Elements(OPS));
        group.bench_with_input(BenchmarkId::new("scq_1024", threads), &threads, |b, &threads| {
            b.iter(|| {
                let q = Arc::new(Scq::new(1024));
                let per = OPS / threads;
                let producers: Vec<_> = (0..threads)
                    .map(|_| {
                        let q = Arc::clone(&q);
                        thread::spawn(move || {
                            for i in 0..per {
                                while !q.enqueue(i) {
                                    std::hint::spin_loop();
                                }
                            }
                        })
                    })
                    .collect();
                let consumers: Vec<_> = (0..threads)
                    .map(|_| {
                        let q = Arc::clone(&q);
                        thread::spawn(move || {
                            let mut got = 0;
                            while got < per {
                                if q.dequeue().is_some() {
                                    got += 1;
                                }
                            }
                        })
                    })
                    .collect();
                for h in producers.into_iter().chain(consumers) {
                    h.join().unwrap();
                }
            });
        });
    }
    group.finish();
}

criterion_group!(benches, single_thread, spsc, mpmc);
criterion_main!(benches);
