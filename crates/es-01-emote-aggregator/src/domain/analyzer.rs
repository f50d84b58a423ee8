//! Per-minute significance analysis.
//!
//! Groups a buffer of reactions into minute windows, tallies each emote and
//! emits one `SignificantMoment` for every (window, emote) pair whose share of
//! the window is strictly greater than the threshold.
//!
//! Output order is deterministic: windows in the order first seen during the
//! scan, then emotes in the order first seen within the window.

use shared_types::{ReactionEvent, SignificantMoment, TimeWindow};
use std::collections::HashMap;

/// Emote counts for one window. Built during a pass and then discarded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WindowTally {
    pub window: TimeWindow,
    /// `(emote, count)` in first-seen order.
    pub counts: Vec<(String, u64)>,
    pub total: u64,
}

impl WindowTally {
    fn new(window: TimeWindow) -> Self {
        Self {
            window,
            counts: Vec::new(),
            total: 0,
        }
    }

    fn record(&mut self, emote: &str) {
        match self.counts.iter_mut().find(|(e, _)| e == emote) {
            Some((_, count)) => *count += 1,
            None => self.counts.push((emote.to_string(), 1)),
        }
        self.total += 1;
    }

    pub fn count_of(&self, emote: &str) -> u64 {
        self.counts
            .iter()
            .find(|(e, _)| e == emote)
            .map_or(0, |(_, c)| *c)
    }
}

/// Stateless analyzer bound to one threshold.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SignificanceAnalyzer {
    threshold: f64,
}

impl SignificanceAnalyzer {
    pub fn new(threshold: f64) -> Self {
        Self { threshold }
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    /// Compute the significant moments of `events`.
    ///
    /// Pure: the same input always yields the same output.
    pub fn analyze(&self, events: &[ReactionEvent]) -> Vec<SignificantMoment> {
        let mut moments = Vec::new();
        for tally in tally(events) {
            for (emote, count) in &tally.counts {
                let ratio = *count as f64 / tally.total as f64;
                if ratio > self.threshold {
                    moments.push(SignificantMoment {
                        window: tally.window,
                        emote: emote.clone(),
                        count: *count,
                        total_in_window: tally.total,
                    });
                }
            }
        }
        moments
    }
}

/// Group events by minute window, preserving first-seen order.
pub fn tally(events: &[ReactionEvent]) -> Vec<WindowTally> {
    let mut tallies: Vec<WindowTally> = Vec::new();
    let mut index: HashMap<TimeWindow, usize> = HashMap::new();

    for event in events {
        let window = event.window();
        let slot = *index.entry(window).or_insert_with(|| {
            tallies.push(WindowTally::new(window));
            tallies.len() - 1
        });
        tallies[slot].record(&event.emote);
    }

    tallies
}
