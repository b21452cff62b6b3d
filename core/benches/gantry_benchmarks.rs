use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use gantry::{
  FactComputer, Gate, GateContext, HandlerExecutor, Outcome, Run, RunConfig, Trigger, UnitDef, UnitOutputs,
  UnitState, Workflow,
};
use indexmap::IndexMap;
use std::collections::HashMap;
use tokio::runtime::Runtime;

const PUBLISH_GATE: &str = "${{ facts.masterPush && !failure() && !cancelled() && needs.build.outputs.version != '' }}";

// --- Helpers ---

/// A root unit fanning out to `width` gated units that all feed one sink.
fn wide_workflow(width: usize) -> Workflow {
  let mut workflow = Workflow::new("wide");
  workflow.add_unit(UnitDef::new("root")).unwrap();
  let mut leaves = Vec::with_capacity(width);
  for idx in 0..width {
    let name = format!("leaf{}", idx);
    let gate = if idx % 2 == 0 { Gate::fact("masterPush") } else { !Gate::failure() };
    workflow
      .add_unit(UnitDef::new(name.clone()).needs(["root"]).gate(gate))
      .unwrap();
    leaves.push(name);
  }
  workflow
    .add_unit(UnitDef::new("sink").needs(leaves).gate(Gate::always()))
    .unwrap();
  workflow
}

// --- Benchmark Functions ---

fn bench_gate_parse(c: &mut Criterion) {
  c.bench_function("gate_parse_publish_condition", |b| {
    b.iter(|| Gate::parse(std::hint::black_box(PUBLISH_GATE)).unwrap())
  });
}

fn bench_gate_evaluate(c: &mut Criterion) {
  let facts = FactComputer::ci_defaults()
    .compute(&Trigger::push("refs/heads/master"), &RunConfig::default())
    .unwrap();
  let gate = Gate::parse(PUBLISH_GATE).unwrap();
  let needs = vec!["build".to_string(), "tests".to_string(), "lint".to_string()];
  let states: IndexMap<String, UnitState> = needs
    .iter()
    .map(|n| (n.clone(), UnitState::Done(Outcome::Succeeded)))
    .collect();
  let mut outputs: HashMap<String, UnitOutputs> = HashMap::new();
  outputs.insert(
    "build".to_string(),
    [("version".to_string(), "1.0.0".to_string())].into_iter().collect(),
  );

  c.bench_function("gate_evaluate_publish_condition", |b| {
    b.iter(|| {
      let ctx = GateContext::new(&facts, &needs, &states, &outputs, false);
      gate.evaluate(&ctx).unwrap()
    })
  });
}

fn bench_fact_compute(c: &mut Criterion) {
  let computer = FactComputer::ci_defaults();
  let trigger = Trigger::pull_request("refs/pull/1/merge", "master");
  let config = RunConfig::default();
  c.bench_function("fact_compute_ci_defaults", |b| {
    b.iter(|| computer.compute(&trigger, &config).unwrap())
  });
}

fn bench_wide_run(c: &mut Criterion) {
  let rt = Runtime::new().unwrap();
  let mut group = c.benchmark_group("wide_run");

  for width in [8usize, 64, 256].iter() {
    group.throughput(Throughput::Elements(*width as u64));
    group.bench_with_input(BenchmarkId::from_parameter(width), width, |b, &width| {
      b.to_async(&rt).iter_batched(
        || Run::new(wide_workflow(width), HandlerExecutor::new()),
        |run| async move {
          let report = run.execute(&Trigger::push("refs/heads/master")).await.unwrap();
          assert!(report.is_success());
        },
        criterion::BatchSize::SmallInput,
      );
    });
  }
  group.finish();
}

criterion_group!(
  benches,
  bench_gate_parse,
  bench_gate_evaluate,
  bench_fact_compute,
  bench_wide_run
);
criterion_main!(benches);
