use std::time::Instant;

/// Returns a formatted string of elapsed time, e.g.
/// `1min 34.852s`
pub fn get_formatted_elapsed_time(instant: Instant) -> String {
    let dur = instant.elapsed();
    let minutes = dur.as_secs() / 60;
    let sub_sec = dur.as_secs() % 60;
    let sub_milli = dur.subsec_millis();
    if minutes > 0 {
        return format!("{}min {}.{:03}s", minutes, sub_sec, sub_milli);
    }
    format!("{}.{:03}s", sub_sec, sub_milli)
}

/// Prints `Progress: N%` when the percentage changes, whitebox style.
pub struct ProgressReporter {
    verbose: bool,
    label: String,
    old_progress: i32,
}

impl ProgressReporter {
    pub fn new(label: &str, verbose: bool) -> ProgressReporter {
        ProgressReporter {
            verbose,
            label: label.to_string(),
            old_progress: -1,
        }
    }

    /// Reports `done` of `total` steps.
    pub fn update(&mut self, done: usize, total: usize) {
        if !self.verbose || total == 0 {
            return;
        }
        let progress = (100.0_f64 * done as f64 / total as f64) as i32;
        if progress != self.old_progress {
            println!("{}: {}%", self.label, progress);
            self.old_progress = progress;
        }
    }
}

#[cfg(test)]
mod test {
    use super::get_formatted_elapsed_time;
    use std::time::Instant;

    #[test]
    fn test_elapsed_time_format() {
        let s = get_formatted_elapsed_time(Instant::now());
        assert!(s.ends_with('s'));
        assert!(!s.contains("min"));
    }
}
