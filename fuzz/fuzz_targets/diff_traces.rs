#![no_main]

use execdiff::config::DiffConfig;
use execdiff::diff::{diff_traces, Strategy};
use execdiff::step_trace::StepTrace;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(input) = std::str::from_utf8(data) else {
        return;
    };
    // two newline-delimited traces separated by a blank line
    let Some((left, right)) = input.split_once("\n\n") else {
        return;
    };
    let (Ok(a), Ok(b)) = (StepTrace::from_ndjson_str(left), StepTrace::from_ndjson_str(right))
    else {
        return;
    };

    for strategy in [Strategy::Flat, Strategy::Hierarchical] {
        let mut config = DiffConfig {
            strategy,
            ..DiffConfig::default()
        };
        config.limits.max_nesting_depth = 32;
        config.limits.max_dp_states = 100_000;

        let report = diff_traces(&a, &b, &config).expect("default config is valid");
        assert!(report.matched_count() <= a.len().min(b.len()));
        assert!(report.pairs.windows(2).all(|w| w[0].a < w[1].a));
    }
});
