use criterion::{criterion_group, criterion_main};

mod at;
mod mqtt;
mod replay;

criterion_group!(
    benches,
    at::bench_send_command,
    at::bench_query,
    at::bench_read_binary,
    mqtt::bench_publish,
    mqtt::bench_process_message,
);
criterion_main!(benches);
