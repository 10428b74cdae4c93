use chrono::{Duration, NaiveDate, TimeZone, Utc};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use era5_pipelines::models::{
    BoundaryMask, DailyRecord, Frequency, GridFrame, GridStack, TemporalAggregation,
};
use era5_pipelines::processors::{TemporalAggregator, ZonalAggregator};

// Hourly frames over a square grid, one mask per block of rows
fn create_test_grid(side: usize, days: usize, boundaries: usize) -> (GridStack, Vec<BoundaryMask>, Vec<String>) {
    let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
    let mut frames = Vec::with_capacity(days * 24);

    for hour in 0..(days * 24) {
        let values = (0..side * side)
            .map(|cell| {
                if cell % 17 == 0 {
                    None
                } else {
                    Some(270.0 + (cell % side) as f64 * 0.1 + (hour % 24) as f64 * 0.5)
                }
            })
            .collect();
        frames.push(GridFrame {
            time: start + Duration::hours(hour as i64),
            values,
        });
    }

    let rows_per_boundary = (side / boundaries).max(1);
    let masks = (0..boundaries)
        .map(|b| {
            let first_row = (b * rows_per_boundary).min(side - 1);
            let last_row = ((b + 1) * rows_per_boundary).min(side);
            BoundaryMask((first_row * side..last_row * side).collect())
        })
        .collect();
    let ids = (0..boundaries).map(|b| format!("D{:03}", b)).collect();

    (
        GridStack {
            ncols: side,
            nrows: side,
            frames,
        },
        masks,
        ids,
    )
}

fn create_daily_records(boundaries: usize, days: usize) -> Vec<DailyRecord> {
    let base_date = NaiveDate::from_ymd_opt(2023, 1, 1).unwrap();
    let mut records = Vec::with_capacity(boundaries * days);

    for boundary in 0..boundaries {
        for day in 0..days {
            let value = 15.0 + (day % 365) as f64 * 0.05 + boundary as f64 * 0.5;
            records.push(DailyRecord {
                boundary_id: format!("D{:03}", boundary),
                date: base_date + Duration::days(day as i64),
                mean: Some(value),
                min: Some(value - 5.0),
                max: Some(value + 5.0),
            });
        }
    }

    records
}

fn benchmark_zonal_aggregation(c: &mut Criterion) {
    let (stack, masks, ids) = create_test_grid(50, 7, 20);

    c.bench_function("zonal_daily_statistics", |b| {
        b.iter(|| {
            let aggregator = ZonalAggregator::new();
            let records = aggregator.aggregate(&stack, &masks, &ids);
            black_box(records.map(|r| r.len()).unwrap_or(0))
        })
    });
}

fn benchmark_resampling(c: &mut Criterion) {
    let daily = create_daily_records(50, 365);

    let mut group = c.benchmark_group("resampling");
    for frequency in [Frequency::Weekly, Frequency::EpiWeekly, Frequency::Monthly] {
        group.bench_with_input(
            BenchmarkId::new("frequency", frequency),
            &frequency,
            |b, &frequency| {
                let aggregator = TemporalAggregator::new(TemporalAggregation::Mean);
                b.iter(|| {
                    let periods = aggregator.resample(&daily, frequency);
                    black_box(periods.map(|p| p.len()).unwrap_or(0))
                })
            },
        );
    }
    group.finish();
}

fn benchmark_varying_grid_sizes(c: &mut Criterion) {
    let mut group = c.benchmark_group("zonal_by_grid_size");

    for &side in &[10, 50, 100] {
        group.bench_with_input(BenchmarkId::new("side", side), &side, |b, &side| {
            let (stack, masks, ids) = create_test_grid(side, 2, 10);
            b.iter(|| {
                let aggregator = ZonalAggregator::new();
                black_box(aggregator.aggregate(&stack, &masks, &ids).map(|r| r.len()).unwrap_or(0))
            })
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    benchmark_zonal_aggregation,
    benchmark_resampling,
    benchmark_varying_grid_sizes
);
criterion_main!(benches);
