/// Format seconds as `MM:SS`, flooring both parts.
///
/// Minutes are not wrapped into hours, so `3661` becomes `61:01`.
/// Negative and non-finite input formats as `00:00`.
pub fn format_time(seconds: f64) -> String {
    if !seconds.is_finite() || seconds < 0.0 {
        return "00:00".to_string();
    }
    let total = seconds.floor() as u64;
    format!("{:02}:{:02}", total / 60, total % 60)
}
