use json_logging::{iso_dates, JsonFormatter, LoggingSetup, StandardField, Value};

/// A value the built-in strategy knows nothing about.
#[derive(Debug)]
struct Money {
    cents: i64,
    currency: &'static str,
}

fn main() {
    let mut formatter =
        JsonFormatter::with_format("%(asctime)s %(levelname)s %(name)s %(message)s");
    formatter
        .projector_mut()
        .rename_field(StandardField::Asctime, "time")
        .rename_field(StandardField::Levelname, "level")
        .add_static_field("app", "monitor")
        .add_processor(|mut record, event| {
            record.insert("pid", event.process_id);
            record
        })
        .add_processor(|mut record, _| {
            // processors run in order, so this sees the pid added above
            if let Some(pid) = record.remove("pid") {
                record.insert("process", Value::from_iter([("pid", pid)]));
            }
            record
        })
        .add_processor(|mut record, _| {
            record.insert(
                "price",
                Value::opaque(Money {
                    cents: 1999,
                    currency: "EUR",
                }),
            );
            record
        });
    formatter
        .renderer_mut()
        .with_ensure_ascii(false)
        .with_default_strategy(|value| {
            match value.downcast_ref::<Money>() {
                Some(money) => {
                    let (units, cents) = (money.cents / 100, money.cents % 100);
                    Ok(Value::from(format!("{units}.{cents:02} {}", money.currency)))
                },
                None => iso_dates(value),
            }
        });

    LoggingSetup::default().with_formatter(formatter).init();

    tracing::info!("Prices are ready ✓");
    // {"time": "2025-06-23 20:04:51,512", "level": "INFO", "name": "custom_processors", "message": "Prices are ready ✓", "app": "monitor", "process": {"pid": 3341821}, "price": "19.99 EUR"}
}
