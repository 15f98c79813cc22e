use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::*;

fn noisy_session(seed: u64, ticks: u64) -> Vec<SampleBatch> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..ticks)
        .map(|i| {
            let squeeze = if (150..250).contains(&i) { 8.0 } else { 0.0 };
            let b = [
                30.0 + squeeze + rng.gen_range(-0.3..0.3),
                20.0 + rng.gen_range(-0.3..0.3),
                30.0 + rng.gen_range(-0.3..0.3),
            ];
            let a = [0.0, 0.0, 1.0 + rng.gen_range(-0.02..0.02)];
            let batch = SampleBatch::new(i * 20, b).with_accel(a);
            if i % 3 == 0 {
                batch.with_touch(rng.gen_range(5.0..15.0))
            } else {
                batch
            }
        })
        .collect()
}

fn replay(batches: &[SampleBatch]) -> (GripEngine, Vec<TickOutcome>) {
    let mut engine = GripEngine::new(GripConfig::default()).unwrap();
    let outcomes = batches
        .iter()
        .map(|b| engine.tick(b, b.timestamp_ms))
        .collect();
    (engine, outcomes)
}

#[test]
fn deterministic_replay_hash() {
    let batches = noisy_session(7, 400);
    let (e1, o1) = replay(&batches);
    let (e2, o2) = replay(&batches);
    assert_eq!(o1, o2);
    assert_eq!(e1.state().digest().unwrap(), e2.state().digest().unwrap());
}

#[test]
fn different_inputs_give_different_digests() {
    let (e1, _) = replay(&noisy_session(1, 300));
    let (e2, _) = replay(&noisy_session(2, 300));
    assert_ne!(e1.state().digest().unwrap(), e2.state().digest().unwrap());
}

#[test]
fn reset_state_matches_fresh_engine() {
    let (mut used, _) = replay(&noisy_session(3, 300));
    assert_eq!(used.phase(), EngineState::Active);
    used.reset();
    let fresh = GripEngine::new(GripConfig::default()).unwrap();
    assert_eq!(used.state().digest().unwrap(), fresh.state().digest().unwrap());
}

#[test]
fn state_serializes_round_trip() {
    let (engine, _) = replay(&noisy_session(4, 200));
    let json = serde_json::to_string(engine.state()).unwrap();
    let back: GripState = serde_json::from_str(&json).unwrap();
    assert_eq!(back.digest().unwrap(), engine.state().digest().unwrap());
}

#[test]
fn outputs_stay_bounded_under_noise() {
    let (_, outcomes) = replay(&noisy_session(5, 400));
    let ready: Vec<_> = outcomes.iter().filter_map(TickOutcome::metrics).collect();
    assert!(!ready.is_empty());
    for m in ready {
        assert!((0.0..=100.0).contains(&m.grip_percent));
        assert!((0.0..=1.0).contains(&m.fused));
        assert!((0.0..=1.0).contains(&m.motion));
    }
}
