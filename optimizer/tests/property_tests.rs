// Property-based tests for analysis soundness.
//
// Two categories:
// 1. Interval arithmetic: concrete values sampled inside the operand bounds
//    always land inside the computed result.
// 2. Engine: a seeded two-argument function analyzed through the full
//    pipeline reports the interval-rule bounds for add/sub/mul.
//
// Uses proptest with explicit configuration to prevent CI flakiness.

use proptest::prelude::*;
use rangeopt::config::{PipelineOptions, Sensor, SensorConfig};
use rangeopt::interval::Interval;
use rangeopt::pass::PassId;
use rangeopt::pipeline::run_pipeline;

// ── Generators ──────────────────────────────────────────────────────────────

/// An interval with finite endpoints and a bounded width.
fn arb_interval() -> impl Strategy<Value = Interval> {
    (-1.0e6f64..1.0e6, 0.0f64..1.0e4).prop_map(|(lo, width)| Interval::ordered(lo, lo + width))
}

fn sample(iv: &Interval, t: f64) -> f64 {
    (iv.lo + (iv.hi - iv.lo) * t).clamp(iv.lo, iv.hi)
}

/// Bounds-check with a relative tolerance for rounding in the endpoints.
fn within(iv: &Interval, v: f64) -> bool {
    let slack = 1e-9 * (1.0 + iv.lo.abs().max(iv.hi.abs()));
    v >= iv.lo - slack && v <= iv.hi + slack
}

// ── 1. Interval arithmetic ──────────────────────────────────────────────────

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 256,
        max_shrink_iters: 200,
        .. ProptestConfig::default()
    })]

    #[test]
    fn add_sub_are_sound(a in arb_interval(), b in arb_interval(), s in 0.0f64..=1.0, t in 0.0f64..=1.0) {
        let (x, y) = (sample(&a, s), sample(&b, t));
        prop_assert!(within(&a.add(&b), x + y));
        prop_assert!(within(&a.sub(&b), x - y));
        prop_assert_eq!(a.add(&b), Interval::ordered(a.lo + b.lo, a.hi + b.hi));
        prop_assert_eq!(a.sub(&b), Interval::ordered(a.lo - b.hi, a.hi - b.lo));
    }

    #[test]
    fn mul_is_sound(a in arb_interval(), b in arb_interval(), s in 0.0f64..=1.0, t in 0.0f64..=1.0) {
        let (x, y) = (sample(&a, s), sample(&b, t));
        let r = a.mul(&b).expect("finite operands");
        prop_assert!(r.lo <= r.hi);
        prop_assert!(within(&r, x * y));
    }

    #[test]
    fn div_is_sound_away_from_zero(a in arb_interval(), lo in 0.5f64..100.0, width in 0.0f64..100.0, negate in any::<bool>(), s in 0.0f64..=1.0, t in 0.0f64..=1.0) {
        let b = if negate {
            Interval::ordered(-(lo + width), -lo)
        } else {
            Interval::ordered(lo, lo + width)
        };
        let (x, y) = (sample(&a, s), sample(&b, t));
        let r = a.div(&b).expect("divisor excludes zero");
        prop_assert!(within(&r, x / y));
    }

    #[test]
    fn hull_contains_both(a in arb_interval(), b in arb_interval()) {
        let h = a.hull(&b);
        prop_assert!(h.contains(a.lo) && h.contains(a.hi));
        prop_assert!(h.contains(b.lo) && h.contains(b.hi));
    }
}

// ── 2. Engine through the pipeline ──────────────────────────────────────────

const TWO_ARG: &str = r#"
define double @f(double %a, double %b) {
entry:
  call void @llvm.dbg.value(double %a) !dbg("a", "A")
  call void @llvm.dbg.value(double %b) !dbg("b", "B")
  %s = fadd double %a, %b
  %d = fsub double %a, %b
  %m = fmul double %a, %b
  ret double %m
}
"#;

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 64,
        max_shrink_iters: 100,
        .. ProptestConfig::default()
    })]

    #[test]
    fn engine_matches_interval_rules(a in arb_interval(), b in arb_interval()) {
        let sensors = SensorConfig {
            sensors: vec![
                Sensor { identifier: "A".into(), lower: a.lo, upper: a.hi },
                Sensor { identifier: "B".into(), lower: b.lo, upper: b.hi },
            ],
        };
        let options = PipelineOptions {
            passes: vec![PassId::RangeAnalysis],
            ..PipelineOptions::default()
        };
        let out = run_pipeline(TWO_ARG, &sensors, &options).expect("pipeline");
        prop_assert_eq!(out.bound("f", "s"), Some(a.add(&b)));
        prop_assert_eq!(out.bound("f", "d"), Some(a.sub(&b)));
        prop_assert_eq!(out.bound("f", "m"), a.mul(&b));
        prop_assert_eq!(out.result("f"), a.mul(&b));
    }
}
