use criterion::{Criterion, black_box, criterion_group, criterion_main};
use sciagents_core::agents::ExperimentalAgent;
use sciagents_core::domain::Domain;
use sciagents_core::parsing::{extract_field, parse_with_repair};
use sciagents_core::schemas::HypothesisDraft;
use sciagents_core::simulation::{GenericSimulator, PendulumSimulator};
use sciagents_core::stats;

fn bench_domain_simulations(c: &mut Criterion) {
    let sim = GenericSimulator::with_seed(1);

    for domain in [
        Domain::Physics,
        Domain::Chemistry,
        Domain::Biology,
        Domain::Environmental,
        Domain::Engineering,
        Domain::Medicine,
        Domain::General,
    ] {
        let params = ExperimentalAgent::domain_parameters(domain, "");
        let measurements = ExperimentalAgent::default_measurements(domain);
        c.bench_function(&format!("simulate_{}", domain), |b| {
            b.iter(|| sim.run_experiment(black_box(domain.as_str()), &params, &measurements))
        });
    }
}

fn bench_pendulum(c: &mut Criterion) {
    let pendulum = PendulumSimulator::default();
    c.bench_function("pendulum_1000_steps", |b| {
        b.iter(|| pendulum.simulate(black_box(0.2), 1000, 0.01, 0.01))
    });
}

fn bench_statistics(c: &mut Criterion) {
    let x: Vec<f64> = (0..1000).map(|i| i as f64).collect();
    let y: Vec<f64> = x.iter().map(|v| 2.0 * v + (v * 0.37).sin()).collect();

    c.bench_function("pearson_1000", |b| {
        b.iter(|| stats::pearson(black_box(&x), black_box(&y)))
    });

    c.bench_function("correlation_p_value_small_n", |b| {
        b.iter(|| stats::correlation_p_value(black_box(0.62), black_box(12)))
    });
}

fn bench_parsers(c: &mut Criterion) {
    let fenced = "Here you go:\n```json\n{\"statement\": \"Heat speeds reactions\", \"confidence\": 0.8, \"variables\": [\"temperature\", \"rate\"]}\n```";
    c.bench_function("parse_with_repair_fenced", |b| {
        b.iter(|| parse_with_repair::<HypothesisDraft>(black_box(fenced)))
    });

    let labelled = "HYPOTHESIS: Heat speeds reactions\nCONFIDENCE: 0.8\nMATHEMATICAL_MODEL: k = A exp(-Ea/RT)\nVARIABLES: temperature, rate\nREASONING: Arrhenius";
    c.bench_function("extract_field_labelled", |b| {
        b.iter(|| extract_field(black_box(labelled), "MATHEMATICAL_MODEL", &["VARIABLES:"]))
    });
}

criterion_group!(
    benches,
    bench_domain_simulations,
    bench_pendulum,
    bench_statistics,
    bench_parsers,
);
criterion_main!(benches);
