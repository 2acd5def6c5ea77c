/// Simulated battle time in seconds. Moves forward only.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SimClock {
    now: f64,
}

impl SimClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn now(&self) -> f64 {
        self.now
    }

    /// Moves the clock to `t`.
    ///
    /// # Panics
    /// When `t` is not finite or lies before the current time.
    pub fn advance_to(&mut self, t: f64) {
        assert!(t.is_finite(), "simulated time must be finite, got {t}");
        assert!(
            t >= self.now,
            "simulated clock cannot move backward: {} -> {t}",
            self.now
        );
        self.now = t;
    }
}
