//! Benchmarks for validation and run execution.

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use runflow::config::{EngineConfig, ExecutorConfig};
use runflow::engine::RunEngine;
use runflow::models::TriggerRequest;
use runflow::pipeline::validate_stages;
use runflow::testing::linear_definition;

fn validation_benchmark(c: &mut Criterion) {
    let definition = linear_definition("bench", 64);
    c.bench_function("validate_64_stage_chain", |b| {
        b.iter(|| validate_stages(black_box(&definition.stages)))
    });
}

fn run_benchmark(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().expect("tokio runtime");
    let engine = RunEngine::from_config(
        EngineConfig::default()
            .with_run_timeout(None)
            .with_executor(ExecutorConfig::instant()),
    )
    .expect("engine");
    let pipeline = rt
        .block_on(engine.validate_and_create_pipeline(linear_definition("bench", 16)))
        .expect("pipeline");

    c.bench_function("run_16_instant_stages", |b| {
        b.iter(|| {
            rt.block_on(async {
                let run = engine
                    .trigger_run(pipeline.id, TriggerRequest::manual())
                    .await
                    .expect("trigger");
                black_box(engine.wait_for_run(pipeline.id, run.id).await.expect("run"))
            })
        })
    });
}

criterion_group!(benches, validation_benchmark, run_benchmark);
criterion_main!(benches);
