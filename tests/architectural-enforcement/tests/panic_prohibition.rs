//! Integration Test: Panic Prohibition in the Library
//!
//! **Policy**: `scribe-core` MUST report failures through its error types.
//! A malformed reply is an expected outcome and must surface as a
//! `ReplyError`, never as a panic inside the caller's task.
//! **Exceptions**: test code, doc comments

use architectural_enforcement::{code_part, is_in_test_function, rust_sources};

/// Test that library code does not unwrap or expect
#[test]
fn test_no_unwrap_in_library_code() {
    let mut violations = Vec::new();

    for file in rust_sources("scribe/core/src") {
        let lines = file.lines();
        for (idx, line) in lines.iter().enumerate() {
            let code = code_part(line);
            if is_in_test_function(&lines, idx) {
                continue;
            }
            if code.contains(".unwrap()") || code.contains(".expect(\"") {
                violations.push(file.violation(idx, "Panicking call", line));
            }
            if code.contains("panic!(") || code.contains("unreachable!(") {
                violations.push(file.violation(idx, "Explicit panic", line));
            }
        }
    }

    if !violations.is_empty() {
        eprintln!("\n❌ CRITICAL: Panicking calls found in library code!\n");

        for violation in &violations {
            eprintln!("  ❌ {}", violation);
        }

        eprintln!("\n✅ REQUIRED:");
        eprintln!("  - Propagate with `?` into DecodeError, ConfigError or anyhow::Error");
        eprintln!("  - Use unwrap_or / unwrap_or_default where a fallback exists");

        panic!(
            "\nFound {} panicking call(s) in library code.\nFix these before merging!",
            violations.len()
        );
    }
}
