// PairVM Reports
// Human-readable run and collector summaries for the command line

use std::fmt::Write;
use std::time::Duration;

use colored::*;

use crate::vm::{GcStats, Heap, RunOutcome, Value};

/// Execution time, instruction count and result of a finished run
pub fn format_run_summary(outcome: &RunOutcome, elapsed: Duration) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "{} {:.6} seconds",
        "Execution time:".bold(),
        elapsed.as_secs_f64()
    );
    let _ = writeln!(out, "{} {}", "Instructions executed:".bold(), outcome.instructions);
    match outcome.top {
        Some(value) => {
            let _ = writeln!(out, "{} {}", "Result:".bold(), format_value(value));
        }
        None => {
            let _ = writeln!(out, "{}", "Stack empty at the execution".yellow());
        }
    }
    if outcome.reason.is_error() {
        let _ = writeln!(out, "{} {}", "Runtime error:".red().bold(), outcome.reason);
    }
    out
}

fn format_value(value: Value) -> String {
    match value {
        Value::Int(n) => n.to_string(),
        Value::Obj(handle) => format!("<object {}>", handle).cyan().to_string(),
    }
}

/// The collector statistics block
pub fn format_gc_stats(stats: &GcStats, heap: &Heap) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "\n{}", "GC statistics".yellow().bold());
    let rows: [(&str, String); 10] = [
        ("Collections", stats.collections.to_string()),
        ("Objects allocated", stats.objects_allocated.to_string()),
        ("Objects freed", stats.objects_freed.to_string()),
        ("Objects live", heap.live_count().to_string()),
        ("Peak live objects", stats.peak_live.to_string()),
        ("Bytes allocated", stats.bytes_allocated.to_string()),
        ("Next threshold", heap.threshold().to_string()),
        ("Total GC time", format_duration(stats.total_gc_time)),
        ("Average pause", format_duration(stats.average_pause())),
        (
            "Min / max pause",
            format!(
                "{} / {}",
                format_duration(stats.min_pause.unwrap_or_default()),
                format_duration(stats.max_pause)
            ),
        ),
    ];
    for (label, value) in rows {
        let _ = writeln!(out, "  {:<20} {}", format!("{}:", label), value);
    }
    out
}

fn format_duration(duration: Duration) -> String {
    format!("{:.6} s", duration.as_secs_f64())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::HaltReason;

    #[test]
    fn test_run_summary() {
        colored::control::set_override(false);
        let outcome = RunOutcome {
            reason: HaltReason::DivisionByZero,
            top: Some(Value::Int(12)),
            instructions: 7,
        };
        let text = format_run_summary(&outcome, Duration::from_millis(5));
        assert!(text.contains("Execution time: 0.005000 seconds"));
        assert!(text.contains("Instructions executed: 7"));
        assert!(text.contains("Result: 12"));
        assert!(text.contains("Runtime error: division by zero"));
    }

    #[test]
    fn test_empty_stack_summary() {
        colored::control::set_override(false);
        let outcome = RunOutcome {
            reason: HaltReason::Requested,
            top: None,
            instructions: 1,
        };
        let text = format_run_summary(&outcome, Duration::ZERO);
        assert!(text.contains("Stack empty at the execution"));
        assert!(!text.contains("Runtime error"));
    }

    #[test]
    fn test_gc_stats_block() {
        colored::control::set_override(false);
        let mut heap = Heap::default();
        heap.allocate_pair(Value::Int(1), Value::Int(2)).unwrap();
        heap.collect(&[]);
        let text = format_gc_stats(heap.stats(), &heap);
        assert!(text.contains("Collections:         1"));
        assert!(text.contains("Objects freed:       1"));
        assert!(text.contains("Next threshold:      100"));
    }
}
