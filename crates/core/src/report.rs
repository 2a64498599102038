//! Normalization of gtest JSON reports (`--gtest_output=json`) into test rows.

use serde::Serialize;
use serde_json::Value;

use crate::models::{PerformanceSummary, Platform, PlatformReports, PlatformSummary};

/// Status gtest reports for a test that ran to completion.
pub const COMPLETED: &str = "COMPLETED";
pub const UNKNOWN: &str = "UNKNOWN";

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum RowFilter {
    /// Every test case.
    All,
    /// Only `Performance*` / `TestPerformance*` suites or tests.
    Performance,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TestRow {
    pub platform: Platform,
    pub suite: String,
    pub test: String,
    pub full_name: String,
    #[serde(rename = "timeMs")]
    pub duration_ms: f64,
    pub status: String,
}

/// Whether a JSON document has the shape of a gtest report.
pub fn is_gtest_report(value: &Value) -> bool {
    value.get("tests").is_some_and(Value::is_number)
        && value.get("testsuites").is_some_and(Value::is_array)
}

/// Convert a gtest duration such as `"0.25s"` to milliseconds.
/// Anything that isn't a number of seconds yields 0.
pub fn parse_duration_ms(value: Option<&Value>) -> f64 {
    let seconds = match value {
        Some(Value::String(text)) => {
            let text = text.trim();
            text.strip_suffix('s').unwrap_or(text).trim().parse::<f64>().ok()
        }
        Some(Value::Number(number)) => number.as_f64(),
        _ => None,
    };
    seconds.filter(|s| s.is_finite()).map_or(0.0, |s| s * 1000.0)
}

fn is_performance_test(suite: &str, test: &str) -> bool {
    let suite = suite.to_lowercase();
    let test = test.to_lowercase();
    suite.starts_with("performance")
        || suite.starts_with("testperformance")
        || test.starts_with("performance")
        || test.starts_with("testperformance")
}

fn str_field<'a>(value: &'a Value, key: &str) -> &'a str {
    value.get(key).and_then(Value::as_str).unwrap_or_default()
}

pub fn extract_rows(report: &Value, platform: Platform, filter: RowFilter) -> Vec<TestRow> {
    let mut rows = Vec::new();
    let suites = report.get("testsuites").and_then(Value::as_array);
    for suite in suites.into_iter().flatten() {
        let suite_name = str_field(suite, "name");
        let tests = suite.get("testsuite").and_then(Value::as_array);
        for test in tests.into_iter().flatten() {
            let test_name = str_field(test, "name");
            if filter == RowFilter::Performance && !is_performance_test(suite_name, test_name) {
                continue;
            }
            rows.push(TestRow {
                platform,
                suite: suite_name.to_string(),
                test: test_name.to_string(),
                full_name: format!("{suite_name}.{test_name}"),
                duration_ms: parse_duration_ms(test.get("time")),
                status: test.get("result").and_then(Value::as_str).unwrap_or(UNKNOWN).to_string(),
            });
        }
    }
    rows
}

/// Totals for one platform. `errors` is always 0: gtest only reports a
/// completion status per test, so every non-completed test counts as a failure.
pub fn summarize_platform(platform: Platform, report: &Value, rows: &[TestRow]) -> PlatformSummary {
    PlatformSummary {
        platform,
        tests: rows.len(),
        failures: rows.iter().filter(|row| row.status != COMPLETED).count(),
        errors: 0,
        total_ms: rows.iter().map(|row| row.duration_ms).sum(),
        timestamp: report.get("timestamp").and_then(Value::as_str).map(str::to_string),
    }
}

fn count_field(report: &Value, key: &str) -> usize {
    report.get(key).and_then(Value::as_u64).unwrap_or_default() as usize
}

/// Totals as stated by the report itself rather than counted from its rows.
pub fn summarize_report_totals(platform: Platform, report: &Value) -> PlatformSummary {
    PlatformSummary {
        platform,
        tests: count_field(report, "tests"),
        failures: count_field(report, "failures"),
        errors: count_field(report, "errors"),
        total_ms: parse_duration_ms(report.get("time")),
        timestamp: report.get("timestamp").and_then(Value::as_str).map(str::to_string),
    }
}

/// Performance test totals for whichever platforms a commit produced reports for.
pub fn summarize_performance(reports: &PlatformReports) -> PerformanceSummary {
    let platforms = reports
        .iter()
        .map(|(&platform, report)| {
            let rows = extract_rows(report, platform, RowFilter::Performance);
            summarize_platform(platform, report, &rows)
        })
        .collect::<Vec<_>>();
    if platforms.is_empty() {
        return PerformanceSummary::default();
    }
    let totals = platforms.iter().map(|p| p.total_ms);
    let mean_total_ms = totals.clone().sum::<f64>() / platforms.len() as f64;
    let max_total_ms = totals.fold(f64::MIN, f64::max);
    PerformanceSummary { platforms, mean_total_ms, max_total_ms }
}
