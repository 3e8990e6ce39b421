use std::io::sink;

use chrono::NaiveDate;
use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use json_logging::{
    FieldProjector,
    JsonFormatter,
    JsonLayer,
    JsonRenderer,
    LogEvent,
    Message,
    Severity,
    Value,
};
use tracing_subscriber::{layer::SubscriberExt, Registry};

fn mk_dispatch() -> tracing::Dispatch {
    let mut layer = JsonLayer::<Registry>::new(sink);
    layer.with_formatter(JsonFormatter::default().with_module_and_severity());
    tracing::Dispatch::new(Registry::default().with(layer))
}

fn mk_event() -> LogEvent {
    LogEvent::new(Severity::Info, "bench", "request %s took %d ms")
        .with_extra("user", "ada")
        .with_extra("day", NaiveDate::from_ymd_opt(2024, 5, 1))
        .with_extra(
            "nested",
            Value::from_iter([("items", Value::from(vec![1, 2, 3])), ("ok", Value::from(true))]),
        )
}

fn bench_format(c: &mut Criterion) {
    let formatter = JsonFormatter::new(
        FieldProjector::with_format("%(asctime)s %(levelname)s %(name)s %(message)s"),
        JsonRenderer::default(),
    );
    let event = mk_event();
    let mut mapping = mk_event();
    mapping.message = Message::map([("text", Value::from("hello")), ("num", Value::from(1))]);

    let mut group = c.benchmark_group("format");
    group.throughput(Throughput::Elements(1));
    group.bench_function("text", |b| {
        let mut out = Vec::new();
        b.iter(|| {
            formatter.format_into(&event, &mut out);
            out.clear();
        });
    });
    group.bench_function("mapping", |b| {
        let mut out = Vec::new();
        b.iter(|| {
            formatter.format_into(&mapping, &mut out);
            out.clear();
        });
    });
    group.finish();
}

fn bench_event(c: &mut Criterion) {
    let mut group = c.benchmark_group("event");
    for i in [1, 10, 100] {
        group.throughput(Throughput::Elements(i));
        group.bench_with_input(BenchmarkId::new("single_thread", i), &i, |b, &i| {
            tracing::dispatcher::with_default(&mk_dispatch(), || {
                b.iter(|| {
                    for n in 0..i {
                        tracing::info!(n, user = "ada", "event");
                    }
                });
            });
        });
        group.bench_with_input(BenchmarkId::new("in_span", i), &i, |b, &i| {
            tracing::dispatcher::with_default(&mk_dispatch(), || {
                let span = tracing::info_span!("request", id = 42);
                let _span = span.enter();
                b.iter(|| {
                    for n in 0..i {
                        tracing::info!(n, "event");
                    }
                });
            });
        });
    }
    group.finish();
}

criterion_group!(benches, bench_format, bench_event);
criterion_main!(benches);
