//! Integration Test: Sleep Prohibition
//!
//! **Policy**: Production code MUST NOT call sleep methods. The decoder waits
//! on channels and the HTTP body, never on a timer. Request deadlines use
//! `tokio::time::timeout` or the HTTP client's own timeout.
//! **Exceptions**: test code

use architectural_enforcement::{code_part, is_in_test_function, rust_sources, PRODUCTION_DIRS};

/// Test that production code does not contain sleep() calls
#[test]
fn test_no_sleep_in_production_code() {
    let mut violations = Vec::new();

    for dir in PRODUCTION_DIRS {
        for file in rust_sources(dir) {
            let lines = file.lines();
            for (idx, line) in lines.iter().enumerate() {
                let code = code_part(line);
                if !(code.contains("::sleep(") || code.contains(".sleep(")) {
                    continue;
                }
                if is_in_test_function(&lines, idx) {
                    continue;
                }
                violations.push(file.violation(idx, "Sleep call", line));
            }
        }
    }

    if !violations.is_empty() {
        eprintln!("\n❌ CRITICAL: Sleep calls found in production code!\n");

        for violation in &violations {
            eprintln!("  ❌ {}", violation);
        }

        eprintln!("\n❌ FORBIDDEN:");
        eprintln!("  - Sleep in polling loops");
        eprintln!("  - Sleep to 'wait' for fragments (await the channel instead)");

        panic!(
            "\nFound {} sleep violation(s) in production code.\nFix these before merging!",
            violations.len()
        );
    }
}
