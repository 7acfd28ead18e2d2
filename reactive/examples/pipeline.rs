//! A small sensor pipeline.
//!
//! This example shows:
//! - Decorated streams built once and listened to many times
//! - Merging live and replayed sources
//! - Combining the latest readings of several sensors
//! - Racing background computations on a worker pool

use rusty_reactive::{
    Callback, DisposeReason, Indexed, Source, StreamExt, SyncSource, TaskStream, WorkerPool, join,
};

// ============================================================================
// Events
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq)]
struct Reading {
    sensor: u8,
    celsius: f32,
}

fn main() -> rusty_reactive::Result<()> {
    // ------------------------------------------------------------------------
    // Decorated chains
    // ------------------------------------------------------------------------
    let readings = Source::<Reading>::new();
    let fahrenheit = readings
        .clone()
        .filter(|r| r.celsius > -273.15)
        .map(|r| (r.sensor, r.celsius * 9.0 / 5.0 + 32.0));

    let printer = fahrenheit.listen(Callback::new(|(sensor, f): &(u8, f32)| {
        println!("sensor {sensor}: {f:.1}°F");
    }));
    let alarm = fahrenheit
        .clone()
        .filter(|(_, f)| *f > 100.0)
        .first()
        .listen(
            Callback::new(|(sensor, _): &(u8, f32)| println!("alarm from sensor {sensor}"))
                .with_dispose(|reason: DisposeReason| println!("alarm disarmed ({reason:?})")),
        );

    for (sensor, celsius) in [(1, 21.5), (2, 39.0), (1, 40.5), (2, -300.0)] {
        readings.publish(&Reading { sensor, celsius });
    }
    println!("alarm active: {}", alarm.is_active());
    printer.dispose();

    // ------------------------------------------------------------------------
    // Merge and combine
    // ------------------------------------------------------------------------
    let live = Source::<f32>::new();
    let history = Source::replay([18.0, 19.5]);
    let merged = join::merge([history.boxed(), live.clone().boxed()], 1)?;
    let _all = merged.listen(Callback::new(|t: &f32| println!("merged: {t}")));
    live.publish(&20.0);
    live.dispose();

    let indoor = Source::<f32>::new();
    let outdoor = Source::<f32>::new();
    let _delta = join::combine_latest([indoor.clone(), outdoor.clone()])
        .map(|latest| latest[0] - latest[1])
        .listen(Callback::new(|d: &f32| println!("indoor - outdoor = {d}")));
    indoor.publish(&21.0);
    outdoor.publish(&4.0);
    outdoor.publish(&6.5);

    // ------------------------------------------------------------------------
    // Thread-safe sources and background tasks
    // ------------------------------------------------------------------------
    let shared = SyncSource::<u64>::new();
    let _sum = shared.listen(Callback::new(|v: &u64| println!("from worker thread: {v}")));

    let pool = WorkerPool::new(2);
    let producer = shared.clone();
    pool.execute(move || producer.publish(&7))?;

    let slow = TaskStream::spawn(&pool, || {
        std::thread::sleep(std::time::Duration::from_millis(20));
        "slow"
    })?;
    let fast = TaskStream::spawn(&pool, || "fast")?;

    let _winner = join::race_any([slow.clone(), fast.clone()]).listen(
        Callback::new(|Indexed { index, value }: &Indexed<&str>| {
            println!("race won by #{index}: {value}");
        })
        .with_dispose(|reason: DisposeReason| println!("race finished ({reason:?})")),
    );
    println!("slow task result: {:?}", slow.wait()?);

    drop(pool);
    shared.dispose();
    Ok(())
}
