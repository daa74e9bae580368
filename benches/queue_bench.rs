//! Benchmarks for blob-sweep
//!
//! Run with: cargo bench

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use std::path::{Path, PathBuf};

fn benchmark_queue_operations(c: &mut Criterion) {
    use blob_sweep::job::Job;
    use blob_sweep::walker::JobQueue;

    c.bench_function("queue_push_recv", |b| {
        let queue = JobQueue::unbounded();
        let sender = queue.sender();
        let receiver = queue.receiver();

        b.iter(|| {
            let job = Job::new(PathBuf::from("/test/path/file.jpg"), "test/path/file.jpg".into());
            sender.push(job).unwrap();
            let received = receiver.try_recv().unwrap();
            black_box(received);
        })
    });
}

fn benchmark_key_mapping(c: &mut Criterion) {
    use blob_sweep::job::KeyMapper;

    c.bench_function("key_for_strip_prefix", |b| {
        let mapper = KeyMapper::identity()
            .strip_root("/srv/photos")
            .with_prefix("backup/2024");
        let path = Path::new("/srv/photos/albums/summer/img_0001.jpg");

        b.iter(|| black_box(mapper.key_for(black_box(path))))
    });
}

criterion_group!(benches, benchmark_queue_operations, benchmark_key_mapping);
criterion_main!(benches);
