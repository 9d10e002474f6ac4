use std::hint::black_box;

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use lb_engine::{RenderBridge, RenderConfig};
use lb_ir::{Event, ParamLabel, SampleId, SourceType};

fn loaded_bridge(voices: usize) -> RenderBridge {
    let mut bridge = RenderBridge::new(RenderConfig {
        max_voices: voices,
        ..RenderConfig::default()
    })
    .unwrap();
    bridge.initialize().unwrap();
    let data: Vec<f32> = (0..44100).map(|i| ((i as f32) * 0.01).sin()).collect();
    let id = SampleId::new("pad").unwrap();
    bridge.load_sample(id, &data).unwrap();

    for i in 0..voices {
        let event = if i % 2 == 0 {
            Event::new(SourceType::Sampler, 0.0)
                .with_sample(id)
                .with_param(ParamLabel::PlaybackLoop, 1.0)
                .with_param(ParamLabel::Sustain, 1000.0)
                .with_param(ParamLabel::ReverbMix, 0.2)
        } else {
            Event::new(SourceType::LFSawSynth, 0.0)
                .with_param(ParamLabel::PitchNote, 40.0 + i as f32)
                .with_param(ParamLabel::Sustain, 1000.0)
                .with_param(ParamLabel::DelayMix, 0.2)
        };
        bridge.apply(&event).unwrap();
    }
    bridge
}

fn bench_render(c: &mut Criterion) {
    let mut group = c.benchmark_group("render_block");
    for &voices in &[0usize, 8, 32, 128] {
        let mut bridge = loaded_bridge(voices);
        group.bench_with_input(BenchmarkId::from_parameter(voices), &voices, |b, _| {
            b.iter(|| {
                black_box(bridge.render());
            })
        });
    }
    group.finish();
}

criterion_group!(benches, bench_render);
criterion_main!(benches);
