use std::sync::Arc;

use bracket_core::{
    build_bracket_app, run_tick, Agent, AgentBundle, AgentId, BracketConfig, CharacterClass,
    Controller, Faction, ResetHooks, SocialFacts,
};
use criterion::{criterion_group, criterion_main, BatchSize, BenchmarkId, Criterion};

fn bench_config() -> Arc<BracketConfig> {
    Arc::new(BracketConfig {
        check_frequency_secs: 1,
        flagged_check_frequency_secs: 1,
        seed: 42,
        ..BracketConfig::default()
    })
}

fn bench_cycle(c: &mut Criterion) {
    let mut group = c.benchmark_group("cycle");

    for population in [250u64, 1_000, 4_000] {
        group.bench_with_input(
            BenchmarkId::new("population", population),
            &population,
            |b, &population| {
                b.iter_batched(
                    || {
                        let mut app = build_bracket_app(
                            bench_config(),
                            SocialFacts::default(),
                            ResetHooks::default(),
                        )
                        .expect("bench config is valid");
                        for id in 0..population {
                            let faction = Faction::ALL[(id % 2) as usize];
                            let agent = Agent {
                                id: AgentId(id + 1),
                                name: format!("Bench{id}"),
                                class: CharacterClass::Warrior,
                                faction,
                                controller: Controller::RandomBot,
                                guild: None,
                            };
                            // Everyone starts at max level so the first cycle moves most of them.
                            app.world.spawn(AgentBundle::new(agent, 80));
                        }
                        app
                    },
                    |mut app| {
                        run_tick(&mut app, 1_000);
                    },
                    BatchSize::SmallInput,
                )
            },
        );
    }

    group.finish();
}

criterion_group!(cycle_benches, bench_cycle);
criterion_main!(cycle_benches);
