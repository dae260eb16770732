// crates/vidcast-core/src/helpers/time.rs
//
// Elapsed-time and progress text for the session status column.

use std::time::Duration;

/// `h:mm:ss`. Hours are not padded and can grow past two digits on
/// long-running loops.
///
/// ```
/// use std::time::Duration;
/// use vidcast_core::helpers::time::format_elapsed;
/// assert_eq!(format_elapsed(Duration::from_secs(0)),    "0:00:00");
/// assert_eq!(format_elapsed(Duration::from_secs(3725)), "1:02:05");
/// ```
pub fn format_elapsed(elapsed: Duration) -> String {
    let secs = elapsed.as_secs();
    format!("{}:{:02}:{:02}", secs / 3600, secs % 3600 / 60, secs % 60)
}

/// Status text for a running session: `[h:mm:ss]  p %`.
///
/// The engine reports raw fractions that can overshoot 1.0 at the end of a
/// loop; the clamp happens here, for display only. Longer sources get more
/// decimals so the number visibly moves:
///
/// | source duration | precision |
/// |-----------------|-----------|
/// | > 5000 s        | `12.34 %` |
/// | > 500 s         | `12.3 %`  |
/// | otherwise       | `12 %`    |
pub fn format_progress(elapsed: Duration, fraction: f64, duration_secs: f64) -> String {
    let pct = if fraction.is_finite() { fraction.clamp(0.0, 1.0) * 100.0 } else { 0.0 };
    let pct = if duration_secs > 5000.0 {
        format!("{pct:.2}")
    } else if duration_secs > 500.0 {
        format!("{pct:.1}")
    } else {
        format!("{}", (pct + 0.5) as u32)
    };
    format!("[{}]  {pct} %", format_elapsed(elapsed))
}
