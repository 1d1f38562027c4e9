use std::hint::black_box;

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use hashcall::codec::{msgpack, Value, Vector3};
use hashcall::invoker::memory::MemoryHost;
use hashcall::invoker::Invoker;
use hashcall::natives::{entity, kvp};

fn bench_native_calls(c: &mut Criterion) {
    let mut host = MemoryHost::new("bench");
    let ped = host.spawn_ped(Vector3::new(1.0, 2.0, 3.0));
    let mut inv = Invoker::new(host);

    let mut group = c.benchmark_group("native_call");
    group.bench_function("get_entity_coords", |b| {
        b.iter(|| black_box(entity::get_entity_coords(&mut inv, black_box(ped)).unwrap()))
    });
    group.bench_function("set_entity_coords", |b| {
        b.iter(|| {
            entity::set_entity_coords(&mut inv, ped, Vector3::new(4.0, 5.0, 6.0), false, false, false, true)
                .unwrap()
        })
    });
    for &len in &[8usize, 256, 4096] {
        let value = "x".repeat(len);
        group.throughput(Throughput::Bytes(len as u64));
        group.bench_with_input(BenchmarkId::new("set_resource_kvp", len), &value, |b, value| {
            b.iter(|| kvp::set_resource_kvp(&mut inv, "bench:key", black_box(value)).unwrap())
        });
    }
    group.finish();
}

fn bench_event_payloads(c: &mut Criterion) {
    let mut group = c.benchmark_group("event_payload");
    for &n in &[1usize, 16, 256] {
        let args: Vec<Value> = (0..n)
            .map(|i| {
                Value::Map(vec![
                    (Value::from("id"), Value::Int(i as i64)),
                    (Value::from("pos"), Value::Vector3(Vector3::new(i as f32, 0.0, 1.0))),
                ])
            })
            .collect();
        let packed = msgpack::pack(&args);
        group.throughput(Throughput::Elements(n as u64));
        group.bench_with_input(BenchmarkId::new("pack", n), &args, |b, args| {
            b.iter(|| black_box(msgpack::pack(args)))
        });
        group.bench_with_input(BenchmarkId::new("unpack", n), &packed, |b, packed| {
            b.iter(|| black_box(msgpack::unpack(packed).unwrap()))
        });
    }
    group.finish();
}

criterion_group!(benches, bench_native_calls, bench_event_payloads);
criterion_main!(benches);
