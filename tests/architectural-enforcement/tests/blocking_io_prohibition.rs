//! Integration Test: Blocking I/O Prohibition
//!
//! **Policy**: Async production code MUST NOT use blocking I/O. The decoder's
//! producer task and the CLI's run loop share the runtime with every other
//! task, so a blocking call stalls the whole reply.
//! **Required**: Use `tokio::fs`, `tokio::io`, `tokio::net`, not `std::fs`, `std::net`, `std::process`
//!
//! Plain functions (configuration loading before the runtime does anything
//! else, logging setup) are allowed to block.

use architectural_enforcement::{
    code_part, is_in_async_function, is_in_non_async_function, is_in_test_function,
    rust_sources, SourceFile, PRODUCTION_DIRS,
};

/// Test that production code does not use blocking I/O
#[test]
fn test_no_blocking_io_in_production_code() {
    let violations = find_blocking_io_violations();

    if !violations.is_empty() {
        eprintln!("\n❌ CRITICAL: Blocking I/O calls found in production code!\n");

        for violation in &violations {
            eprintln!("  ❌ {}", violation);
        }

        eprintln!("\n❌ FORBIDDEN blocking I/O in async code:");
        eprintln!("  - std::fs::read_to_string(), std::fs::write(), std::fs::File");
        eprintln!("  - std::net::TcpStream");
        eprintln!("  - std::process::Command");
        eprintln!("  - reqwest::blocking::*");
        eprintln!("  - std::io::stdin(), std::io::stdout()");
        eprintln!("\n✅ REQUIRED async I/O:");
        eprintln!("  - tokio::fs::read_to_string().await, tokio::fs::write().await");
        eprintln!("  - tokio::io::stdin(), tokio::io::stdout()");
        eprintln!("  - reqwest::Client::post().send().await");
        eprintln!("\n✅ ACCEPTABLE blocking I/O:");
        eprintln!("  - Non-async functions (before the main work starts)");
        eprintln!("  - Test code");

        panic!(
            "\nFound {} blocking I/O violation(s) in production code.\nFix these before merging!",
            violations.len()
        );
    }
}

/// Find all blocking I/O calls in production code
fn find_blocking_io_violations() -> Vec<String> {
    let mut violations = Vec::new();
    for dir in PRODUCTION_DIRS {
        for file in rust_sources(dir) {
            check_file(&file, &mut violations);
        }
    }
    violations
}

fn check_file(file: &SourceFile, violations: &mut Vec<String>) {
    let lines = file.lines();

    for (idx, line) in lines.iter().enumerate() {
        let code = code_part(line);
        if code.trim().is_empty() {
            continue;
        }

        if is_in_test_function(&lines, idx) {
            continue;
        }

        // Module-level imports make blocking calls easy to reach from async code
        let import = code.trim_start().starts_with("use ");

        if !import && is_in_non_async_function(&lines, idx) {
            continue;
        }

        if code.contains("std::fs::") || code.contains("use std::fs") {
            violations.push(file.violation(idx, "Blocking file I/O", line));
        }

        if code.contains("std::net::") || code.contains("use std::net") {
            violations.push(file.violation(idx, "Blocking network I/O", line));
        }

        if code.contains("std::process::Command") {
            violations.push(file.violation(idx, "Blocking process I/O", line));
        }

        if code.contains("reqwest::blocking") {
            violations.push(file.violation(idx, "Blocking HTTP client", line));
        }

        if (code.contains("std::io::stdin()") || code.contains("std::io::stdout()"))
            && is_in_async_function(&lines, idx)
        {
            violations.push(file.violation(idx, "Blocking stdin/stdout in async", line));
        }
    }
}
