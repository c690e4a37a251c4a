/// Renders whole seconds as `MM:SS`. Minutes keep counting past 59.
pub fn format_countdown(seconds: u64) -> String {
    format!("{:02}:{:02}", seconds / 60, seconds % 60)
}

/// Shortest decimal form of a percentage, so `50.0` prints as `50`.
pub fn format_percentage(percentage: f64) -> String {
    format!("{}", percentage)
}
