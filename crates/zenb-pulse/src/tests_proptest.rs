use proptest::prelude::*;

/// Property-based tests for buffer, smoothing and reset invariants

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::SignalRingBuffer;
    use crate::config::EstimatorConfig;
    use crate::engine::PpgEngine;
    use crate::estimator::BpmEstimator;
    use crate::gate::ValidityState;
    use crate::sample::Sample;

    // =========================================================================
    // Buffer never holds a sample older than the window
    // =========================================================================
    proptest! {
        #![proptest_config(ProptestConfig::with_cases(200))]

        #[test]
        fn test_buffer_window_invariant(
            window_sec in 0.5f32..30.0,
            steps in prop::collection::vec(0i64..2_000_000i64, 1..400),
        ) {
            let mut buf = SignalRingBuffer::new(window_sec);
            let mut ts = 0i64;
            for step in steps {
                ts += step;
                buf.push(Sample::new(ts, 0.5));

                let snap = buf.snapshot();
                let newest = snap.last().unwrap().timestamp_us;
                prop_assert_eq!(newest, ts);
                for s in &snap {
                    prop_assert!(s.timestamp_us >= newest - buf.window_us());
                }
                for pair in snap.windows(2) {
                    prop_assert!(pair[0].timestamp_us <= pair[1].timestamp_us);
                }
            }
        }
    }

    // =========================================================================
    // Consecutive accepted estimates never move more than the step cap
    // =========================================================================
    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        #[test]
        fn test_smoothing_step_cap(
            raws in prop::collection::vec(40.0f32..180.0, 2..60),
            cap in 0.5f32..10.0,
            alpha in 0.05f32..1.0,
        ) {
            let config = EstimatorConfig {
                max_step_bpm: cap,
                smoothing_alpha: alpha,
                ..Default::default()
            };
            let mut est = BpmEstimator::new(config);
            let mut prev: Option<f32> = None;
            for raw in raws {
                let next = est.smooth(raw);
                if let Some(p) = prev {
                    prop_assert!((next - p).abs() <= cap + 1e-4,
                        "step {} exceeds cap {}", (next - p).abs(), cap);
                }
                prev = Some(next);
            }
        }
    }

    // =========================================================================
    // Reset always lands in NoSignal / not ready / empty
    // =========================================================================
    proptest! {
        #![proptest_config(ProptestConfig::with_cases(50))]

        #[test]
        fn test_reset_from_any_state(
            values in prop::collection::vec(prop::option::of(0.0f32..1.0), 0..300),
            tick_every in 1usize..60,
        ) {
            let mut engine = PpgEngine::new();
            for (i, v) in values.iter().enumerate() {
                let ts = i as i64 * 33_333;
                match v {
                    Some(v) => engine.submit_sample(Sample::new(ts, *v)),
                    None => engine.submit_dropout(ts),
                }
                if i % tick_every == 0 {
                    engine.tick();
                }
            }
            engine.reset();
            prop_assert_eq!(engine.current_validity(), ValidityState::NoSignal);
            prop_assert!(!engine.current_estimate().ready);
            prop_assert_eq!(engine.buffer_len(), 0);
        }
    }
}
