use crate::*;

const REST: [f32; 3] = [30.0, 20.0, 30.0]; // |B| ≈ 46.9 µT

fn small_config() -> GripConfig {
    let mut cfg = GripConfig::default();
    cfg.window.sample_rate_hint = 4;
    cfg.window.window_seconds = 1.0;
    cfg.calibration.duration_seconds = 1.0;
    cfg
}

/// Rest field with a tiny alternating wobble so the window is not constant.
fn rest_batch(t: u64) -> SampleBatch {
    let wobble = if (t / 20) % 2 == 0 { 0.05 } else { -0.05 };
    SampleBatch::new(t, [REST[0] + wobble, REST[1], REST[2]]).with_accel([0.0, 0.0, 1.0])
}

fn calibrate(engine: &mut GripEngine) -> u64 {
    let mut t = 0;
    loop {
        if engine.tick(&rest_batch(t), t).is_ready() {
            return t;
        }
        t += 20;
        assert!(t < 10_000, "engine never left calibration");
    }
}

#[test]
fn scenario_a_constant_window() {
    let mut w = WindowBuffer::new(4);
    for _ in 0..4 {
        w.push(10.0);
    }
    let s = w.stats();
    assert_eq!((s.mean, s.std, s.peak_to_peak), (10.0, 0.0, 0.0));
}

#[test]
fn scenario_c_two_point_scores() {
    assert_eq!(two_point_score(3.0, 1.0, 5.0), 0.5);
    assert_eq!(two_point_score(0.5, 1.0, 5.0), 0.0);
    assert_eq!(two_point_score(10.0, 1.0, 5.0), 1.0);
}

#[test]
fn scenario_d_iqr_threshold() {
    let t = median_iqr_threshold(&[100.0, 3.0, 1.0, 5.0, 2.0, 4.0], 1.5).unwrap();
    assert_eq!((t.median, t.q1, t.q3, t.iqr), (4.0, 2.0, 4.0, 2.0));
    assert_eq!(t.threshold, 7.0);
}

#[test]
fn scenario_b_calibration_then_active() {
    let mut cfg = GripConfig::default();
    cfg.calibration.duration_seconds = 1.0;
    let mut engine = GripEngine::new(cfg).unwrap();
    assert_eq!(engine.state().magnetic.capacity(), 50);

    let mut t = 0u64;
    while t < 1000 {
        let out = engine.tick(&rest_batch(t), t);
        assert!(matches!(out, TickOutcome::Calibrating(_)), "t={t}");
        assert!(out.metrics().is_none());
        t += 20;
    }
    assert_eq!(engine.phase(), EngineState::Calibrating);

    let out = engine.tick(&rest_batch(1000), 1000);
    assert_eq!(engine.phase(), EngineState::Active);
    let m = out.into_metrics().expect("metrics at 1000ms");
    assert!(m.grip_percent.is_finite());
    assert!((0.0..=100.0).contains(&m.grip_percent));

    let next = engine.tick(&rest_batch(1020), 1020);
    assert!(next.metrics().is_some());
}

#[test]
fn calibration_waits_for_full_window() {
    // 2 s window at 50 Hz = 100 samples; 1 s calibration is not enough alone.
    let mut cfg = GripConfig::default();
    cfg.window.window_seconds = 2.0;
    cfg.calibration.duration_seconds = 1.0;
    let mut engine = GripEngine::new(cfg).unwrap();

    let mut first_ready = None;
    for i in 0..150u64 {
        let t = i * 20;
        if engine.tick(&rest_batch(t), t).is_ready() && first_ready.is_none() {
            first_ready = Some(t);
        }
    }
    // window fills on the 100th tick (t = 1980)
    assert_eq!(first_ready, Some(1980));
    assert!(engine.baseline().is_some());
}

#[test]
fn calibration_progress_reports_fraction() {
    let mut engine = GripEngine::new(small_config()).unwrap();
    match engine.tick(&rest_batch(0), 0) {
        TickOutcome::Calibrating(p) => {
            assert_eq!(p.fraction, 0.0);
            assert_eq!(p.window_len, 1);
            assert_eq!(p.window_capacity, 4);
            assert!(p.window.is_none());
        }
        other => panic!("unexpected {other:?}"),
    }
    for t in [20, 40, 60] {
        engine.tick(&rest_batch(t), t);
    }
    match engine.tick(&rest_batch(500), 500) {
        TickOutcome::Calibrating(p) => {
            assert!((p.fraction - 0.5).abs() < 1e-6);
            assert!(p.window.is_some());
            assert!(p.grip_index.is_some());
        }
        other => panic!("unexpected {other:?}"),
    }
}

#[test]
fn invalid_samples_leave_state_untouched() {
    let mut engine = GripEngine::new(small_config()).unwrap();
    for t in [0, 20, 40] {
        engine.tick(&rest_batch(t), t);
    }
    let before = engine.state().clone();

    let bad = [
        SampleBatch::new(60, [f32::NAN, 1.0, 1.0]),
        SampleBatch::new(60, [0.0, 0.0, 0.0]),
        SampleBatch::new(60, [30.0, 0.0, 0.0]).with_accel([f32::INFINITY, 0.0, 0.0]),
        SampleBatch::new(60, [30.0, 0.0, 0.0]).with_touch(-2.0),
        SampleBatch {
            timestamp_ms: 60,
            ..Default::default()
        },
    ];
    for b in &bad {
        assert!(matches!(engine.tick(b, 60), TickOutcome::NoData(_)));
    }
    assert_eq!(engine.state(), &before);
}

#[test]
fn invalid_first_tick_does_not_anchor_calibration() {
    let mut engine = GripEngine::new(small_config()).unwrap();
    engine.tick(&SampleBatch::new(0, [0.0, 0.0, 0.0]), 0);
    assert_eq!(engine.state().anchor_ms, None);
    engine.tick(&rest_batch(400), 400);
    assert_eq!(engine.state().anchor_ms, Some(400));
}

#[test]
fn dead_magnetometer_is_reported_and_recovers() {
    let mut cfg = small_config();
    cfg.sensors.dead_after_invalid_ticks = 5;
    let mut engine = GripEngine::new(cfg).unwrap();
    for i in 0..5u64 {
        engine.tick(&SampleBatch::new(i * 20, [0.0, 0.0, 0.0]), i * 20);
    }
    assert!(engine.magnetometer_looks_dead());
    assert_eq!(engine.last_invalid_ms(), Some(80));
    engine.tick(&rest_batch(100), 100);
    assert!(!engine.magnetometer_looks_dead());
    assert_eq!(engine.last_invalid_ms(), None);
}

#[test]
fn squeeze_raises_grip_and_release_decays() {
    let mut cfg = small_config();
    cfg.output.smooth_alpha = 0.5;
    cfg.fusion.weights = FusionWeights::new(1.0, 0.0, 0.0);
    let mut engine = GripEngine::new(cfg).unwrap();
    let t0 = calibrate(&mut engine);

    let rest = engine.tick(&rest_batch(t0 + 20), t0 + 20).into_metrics().unwrap();
    assert!(rest.grip_percent < 5.0, "rest grip {}", rest.grip_percent);
    assert_eq!(rest.level, GripLevel::Low);

    // squeeze: field shifts by ~9 µT
    let mut peak = 0.0f32;
    let mut t = t0 + 40;
    for _ in 0..60 {
        let m = engine
            .tick(&SampleBatch::new(t, [40.0, 22.0, 32.0]).with_accel([0.0, 0.0, 1.0]), t)
            .into_metrics()
            .unwrap();
        peak = peak.max(m.grip_percent);
        t += 20;
    }
    assert!(peak > 60.0, "peak {peak}");

    let mut last = peak;
    for _ in 0..120 {
        last = engine.tick(&rest_batch(t), t).into_metrics().unwrap().grip_percent;
        t += 20;
    }
    assert!(last < 5.0, "after release {last}");
}

#[test]
fn motion_suppresses_magnetic_contribution() {
    let mut cfg = small_config();
    cfg.motion.suppress_strength = 1.0;
    let build = || {
        let mut e = GripEngine::new(cfg.clone()).unwrap();
        let t0 = calibrate(&mut e);
        (e, t0)
    };

    let (mut still, t0) = build();
    let (mut shaken, _) = build();
    let mut t = t0 + 20;
    let mut still_m = None;
    let mut shaken_m = None;
    for i in 0..30 {
        let field = [38.0, 22.0, 32.0];
        still_m = still
            .tick(&SampleBatch::new(t, field).with_accel([0.0, 0.0, 1.0]), t)
            .into_metrics();
        let jolt = if i % 2 == 0 { 1.8 } else { 0.3 };
        shaken_m = shaken
            .tick(&SampleBatch::new(t, field).with_accel([0.0, 0.0, jolt]), t)
            .into_metrics();
        t += 20;
    }
    let (still_m, shaken_m) = (still_m.unwrap(), shaken_m.unwrap());
    assert_eq!(still_m.motion, 0.0);
    assert!(shaken_m.motion > 0.5);
    assert!(shaken_m.scores.magnetic < still_m.scores.magnetic);
    assert!(shaken_m.fused < still_m.fused);
}

#[test]
fn touch_contact_is_fused_and_loss_excludes_it() {
    let mut cfg = small_config();
    cfg.fusion.weights = FusionWeights::new(1.0, 0.0, 1.0);
    cfg.fusion.touch_scale = 20.0;
    let mut engine = GripEngine::new(cfg).unwrap();
    let t0 = calibrate(&mut engine);

    let t = t0 + 20;
    let m = engine
        .tick(&rest_batch(t).with_touch(10.0), t)
        .into_metrics()
        .unwrap();
    let touch = m.scores.touch.expect("touch active");
    assert!((touch - 0.5).abs() < 1e-5);
    let expected = (m.scores.magnetic + touch) / 2.0;
    assert!((m.fused - expected).abs() < 1e-5);

    let m = engine.tick(&rest_batch(t + 20), t + 20).into_metrics().unwrap();
    assert_eq!(m.scores.touch, None);
    // magnetic alone, not halved by the missing touch weight
    assert!((m.fused - m.scores.magnetic).abs() < 1e-6);
    assert!(engine.state().touch.is_empty());
}

#[test]
fn stability_threshold_is_frozen_after_calibration() {
    let mut engine = GripEngine::new(small_config()).unwrap();
    let t0 = calibrate(&mut engine);
    let threshold = *engine.threshold().unwrap();

    let mut t = t0 + 20;
    let mut saw_unstable = false;
    for i in 0..40 {
        let jitter = if i % 2 == 0 { 6.0 } else { -6.0 };
        let m = engine
            .tick(&SampleBatch::new(t, [REST[0] + jitter, REST[1], REST[2]]), t)
            .into_metrics()
            .unwrap();
        assert_eq!(m.threshold, threshold.threshold);
        saw_unstable |= m.stability == StabilityDecision::Unstable;
        t += 20;
    }
    assert!(saw_unstable);
    assert_eq!(engine.threshold().unwrap(), &threshold);
}

#[test]
fn reset_returns_to_calibrating() {
    let mut engine = GripEngine::new(small_config()).unwrap();
    let t0 = calibrate(&mut engine);
    engine.capture_level(LevelLabel::Light, 200).unwrap();
    engine.reset();

    assert_eq!(engine.phase(), EngineState::Calibrating);
    assert!(engine.baseline().is_none());
    assert!(engine.threshold().is_none());
    assert!(engine.state().magnetic.is_empty());
    assert!(!engine.is_capturing(LevelLabel::Light));

    // calibration restarts from the next tick
    let t = t0 + 5000;
    assert!(matches!(engine.tick(&rest_batch(t), t), TickOutcome::Calibrating(_)));
    assert_eq!(engine.state().anchor_ms, Some(t));
}

#[test]
fn configure_rebuilds_and_rejects_invalid() {
    let mut engine = GripEngine::new(small_config()).unwrap();
    calibrate(&mut engine);

    let mut bad = small_config();
    bad.output.curve = -1.0;
    assert!(engine.configure(bad).is_err());
    assert_eq!(engine.phase(), EngineState::Active);

    let mut cfg = small_config();
    cfg.window.sample_rate_hint = 10;
    engine.configure(cfg).unwrap();
    assert_eq!(engine.phase(), EngineState::Calibrating);
    assert_eq!(engine.state().magnetic.capacity(), 10);
}

#[test]
fn rest_adaptation_tracks_slow_drift_when_enabled() {
    let drift = |adaptation| {
        let mut cfg = small_config();
        cfg.calibration.adaptation = adaptation;
        cfg.calibration.rest_adapt_alpha = 0.2;
        let mut engine = GripEngine::new(cfg).unwrap();
        let t0 = calibrate(&mut engine);
        let before = engine.baseline().unwrap().magnetic.mean;
        let mut t = t0 + 20;
        for _ in 0..100 {
            engine.tick(
                &SampleBatch::new(t, [REST[0] + 2.0, REST[1], REST[2]]).with_accel([0.0, 0.0, 1.0]),
                t,
            );
            t += 20;
        }
        engine.baseline().unwrap().magnetic.mean - before
    };
    assert_eq!(drift(BaselineAdaptation::Off), 0.0);
    assert!(drift(BaselineAdaptation::WhileAtRest) > 1.0);
}

#[test]
fn level_capture_commits_after_duration() {
    let mut engine = GripEngine::new(small_config()).unwrap();
    let t0 = calibrate(&mut engine);

    engine.capture_level(LevelLabel::Strong, 200).unwrap();
    assert_eq!(
        engine.capture_level(LevelLabel::Strong, 200),
        Err(CaptureError::Busy(LevelLabel::Strong))
    );
    engine.capture_level(LevelLabel::Light, 100).unwrap();

    let mut t = t0 + 20;
    while engine.is_capturing(LevelLabel::Strong) {
        engine.tick(&SampleBatch::new(t, [40.0, 22.0, 32.0]), t);
        t += 20;
    }
    let light = engine.take_capture_result(LevelLabel::Light).unwrap().unwrap();
    let strong = engine.take_capture_result(LevelLabel::Strong).unwrap().unwrap();
    assert_eq!(light.samples, 5);
    assert_eq!(strong.samples, 10);
    assert!(strong.magnetic > 0.0);
    assert_eq!(engine.levels().get(LevelLabel::Strong), Some(&strong));
    assert!(engine.take_capture_result(LevelLabel::Strong).is_none());
}

#[test]
fn cancelled_capture_leaves_slot_alone() {
    let mut engine = GripEngine::new(small_config()).unwrap();
    let t0 = calibrate(&mut engine);
    engine.capture_level(LevelLabel::Medium, 500).unwrap();
    engine.tick(&rest_batch(t0 + 20), t0 + 20);
    assert!(engine.cancel_capture(LevelLabel::Medium));
    assert!(!engine.cancel_capture(LevelLabel::Medium));
    for i in 2..40u64 {
        engine.tick(&rest_batch(t0 + i * 20), t0 + i * 20);
    }
    assert!(engine.levels().get(LevelLabel::Medium).is_none());
    assert!(engine.take_capture_result(LevelLabel::Medium).is_none());
}

#[test]
fn capture_during_calibration_without_samples_fails() {
    let mut engine = GripEngine::new(small_config()).unwrap();
    engine.capture_level(LevelLabel::Light, 100).unwrap();
    for i in 0..10u64 {
        engine.tick(&rest_batch(i * 20), i * 20);
    }
    assert_eq!(
        engine.take_capture_result(LevelLabel::Light),
        Some(Err(CaptureError::NoSamples(LevelLabel::Light)))
    );
}

#[test]
fn two_point_policy_uses_captured_levels() {
    let mut cfg = small_config();
    cfg.fusion.policy = NormalizationPolicy::TwoPoint;
    cfg.fusion.weights = FusionWeights::new(1.0, 0.0, 0.0);
    cfg.output.dead_zone = 0.0;
    cfg.output.curve = 1.0;
    cfg.output.smooth_alpha = 1.0;
    let mut engine = GripEngine::new(cfg).unwrap();
    let t0 = calibrate(&mut engine);
    let base = engine.baseline().unwrap().magnetic.mean;

    // hold a steady offset so the low-pass settles before each capture
    let hold = |engine: &mut GripEngine, t: &mut u64, offset: f32, ticks: usize| {
        for _ in 0..ticks {
            let scale = (base + offset) / base;
            let b = SampleBatch::new(*t, [REST[0] * scale, REST[1] * scale, REST[2] * scale]);
            engine.tick(&b, *t);
            *t += 20;
        }
    };
    let mut t = t0 + 20;
    hold(&mut engine, &mut t, 1.0, 200);
    run_capture(
        &mut engine,
        &mut VecSource::new((0..20).map(|i| {
            let s = (base + 1.0) / base;
            SampleBatch::new(t + i * 20, [REST[0] * s, REST[1] * s, REST[2] * s])
        })),
        LevelLabel::Light,
        200,
    )
    .unwrap();
    t += 400;
    hold(&mut engine, &mut t, 5.0, 200);
    let strong = run_capture(
        &mut engine,
        &mut VecSource::new((0..20).map(|i| {
            let s = (base + 5.0) / base;
            SampleBatch::new(t + i * 20, [REST[0] * s, REST[1] * s, REST[2] * s])
        })),
        LevelLabel::Strong,
        200,
    )
    .unwrap();
    assert!((strong.magnetic - 5.0).abs() < 0.05, "strong {}", strong.magnetic);
    t += 400;

    hold(&mut engine, &mut t, 3.0, 200);
    let scale = (base + 3.0) / base;
    let m = engine
        .tick(&SampleBatch::new(t, [REST[0] * scale, REST[1] * scale, REST[2] * scale]), t)
        .into_metrics()
        .unwrap();
    assert!((m.scores.magnetic - 0.5).abs() < 0.02, "score {}", m.scores.magnetic);
    assert!((m.grip_percent - 50.0).abs() < 2.0);
}

#[test]
fn run_capture_reports_exhausted_source() {
    let mut engine = GripEngine::new(small_config()).unwrap();
    let t0 = calibrate(&mut engine);
    let mut source = VecSource::new((1..4).map(|i| rest_batch(t0 + i * 20)));
    assert_eq!(
        run_capture(&mut engine, &mut source, LevelLabel::Light, 1000),
        Err(CaptureError::SourceExhausted(LevelLabel::Light))
    );
    assert!(!engine.is_capturing(LevelLabel::Light));
}

#[test]
fn drive_ticks_every_batch() {
    let mut engine = GripEngine::new(small_config()).unwrap();
    let mut source = VecSource::new((0..100u64).map(|i| rest_batch(i * 20)));
    let mut ready = 0;
    let mut summary = SummaryLog::new();
    let n = drive(&mut engine, &mut source, |batch, outcome| {
        summary.observe(batch.timestamp_ms, outcome);
        if outcome.is_ready() {
            ready += 1;
        }
    });
    assert_eq!(n, 100);
    // active from t = 1000 (tick 50) onward
    assert_eq!(ready, 50);
    let rows = summary.rows();
    assert!(rows.iter().any(|r| r.phase == "calib"));
    assert!(rows.iter().any(|r| r.phase == "run"));
    // at most one row per 250 ms bucket
    assert!(rows.len() <= 8);
    assert_eq!(rows[0].fields()[6], "");
    assert_eq!(rows.last().unwrap().fields()[0], "run");
}
