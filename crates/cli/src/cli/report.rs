//! Console check lines and pass tallies.

pub fn print_check(name: &str, passed: bool, detail: String) {
    let status = if passed { "PASS" } else { "FAIL" };
    println!("  [{status}] {name}: {detail}");
}

/// Running count of passed checks.
#[derive(Debug, Default, Clone, Copy)]
pub struct Tally {
    pub passed: usize,
    pub total: usize,
}

impl Tally {
    pub fn record(&mut self, passed: bool) {
        self.total += 1;
        if passed {
            self.passed += 1;
        }
    }

    pub fn all_passed(&self) -> bool {
        self.passed == self.total
    }

    /// `passed/total (pct%)`, percentage rounded down.
    pub fn summary(&self) -> String {
        let pct = if self.total == 0 {
            0
        } else {
            self.passed * 100 / self.total
        };
        format!("{}/{} ({pct}%)", self.passed, self.total)
    }
}

/// Print the closing line of a scenario.
pub fn print_verdict(passed: bool) {
    println!();
    if passed {
        println!("All checks passed.");
    } else {
        println!("Some checks failed. Review the output above.");
    }
}
