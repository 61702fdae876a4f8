use std::time::{Duration, Instant};

/// Drop gate bounding how often bare frame messages are processed.
///
/// A frame arriving before `min_interval` has elapsed since the last
/// *processed* frame is dropped (not queued, not acknowledged), so the
/// connection always works on the freshest frame and CPU cost stays bounded
/// under high client frame rates. Explicit `capture` requests and commands
/// bypass this gate entirely.
pub struct FrameGate {
    min_interval: Duration,
    last_processed: Option<Instant>,
}

impl FrameGate {
    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            last_processed: None,
        }
    }

    /// Whether a bare frame arriving now may be processed. Admission marks
    /// the frame as processed.
    pub fn admit(&mut self) -> bool {
        self.admit_at(Instant::now())
    }

    fn admit_at(&mut self, now: Instant) -> bool {
        if let Some(last) = self.last_processed {
            if now.duration_since(last) < self.min_interval {
                return false;
            }
        }
        self.last_processed = Some(now);
        true
    }
}
