#![no_main]

use execdiff::step_trace::StepTrace;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(input) = std::str::from_utf8(data) {
        // Malformed or unbalanced input must be an error, never a panic
        if let Ok(trace) = StepTrace::from_json_str(input) {
            assert_eq!(trace.names.len(), trace.len());
            assert_eq!(trace.properties.len(), trace.len());
        }
        let _ = StepTrace::from_ndjson_str(input);
    }
});
