//! Buckets per-event effects into flushable windows of simulated time.
//!
//! Segments tile the battle timeline as half-open `[start_time, end_time)`
//! ranges. Span-triggered closes land exactly on the `start + max_span` grid and
//! count-triggered closes land on the time of the event that filled the
//! segment, so boundaries depend on event times only and never on where a
//! real-time slice happened to stop.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FlushPolicy {
    /// Close once this many events have been recorded.
    pub max_events: u32,
    /// Close once the segment spans this many simulated seconds. `0` disables
    /// span closes.
    pub max_span: f64,
}

impl Default for FlushPolicy {
    fn default() -> Self {
        Self {
            max_events: 50,
            max_span: 5.0,
        }
    }
}

impl FlushPolicy {
    fn span(&self) -> Option<f64> {
        (self.max_span.is_finite() && self.max_span > 0.0).then_some(self.max_span)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    pub index: u32,
    pub start_time: f64,
    pub end_time: f64,
    pub event_count: u32,
    pub total_damage: i64,
    pub damage_by_source: BTreeMap<String, i64>,
    pub damage_by_type: BTreeMap<String, i64>,
    pub resource_flow: BTreeMap<String, i64>,
    pub tag_counters: BTreeMap<String, i64>,
    pub rng_index_start: i64,
    pub rng_index_end: i64,
}

impl Segment {
    fn open(index: u32, start_time: f64, rng_index: i64) -> Self {
        Self {
            index,
            start_time,
            end_time: start_time,
            event_count: 0,
            total_damage: 0,
            damage_by_source: BTreeMap::new(),
            damage_by_type: BTreeMap::new(),
            resource_flow: BTreeMap::new(),
            tag_counters: BTreeMap::new(),
            rng_index_start: rng_index,
            rng_index_end: rng_index,
        }
    }

    pub fn duration(&self) -> f64 {
        self.end_time - self.start_time
    }

    pub fn rng_draws(&self) -> i64 {
        self.rng_index_end - self.rng_index_start
    }

    /// Merges a zero-width segment that opened at this segment's end.
    ///
    /// # Panics
    /// When `tail` does not start and end at `self.end_time`.
    pub fn absorb(&mut self, tail: Segment) {
        assert!(
            tail.start_time == self.end_time && tail.end_time == self.end_time,
            "only a zero-width tail at {} can be absorbed",
            self.end_time
        );
        self.event_count += tail.event_count;
        self.total_damage += tail.total_damage;
        for (maps, other) in [
            (&mut self.damage_by_source, tail.damage_by_source),
            (&mut self.damage_by_type, tail.damage_by_type),
            (&mut self.resource_flow, tail.resource_flow),
            (&mut self.tag_counters, tail.tag_counters),
        ] {
            for (key, amount) in other {
                add_to(maps, &key, amount);
            }
        }
        self.rng_index_end = tail.rng_index_end;
    }

    pub fn dps(&self) -> f64 {
        let duration = self.duration();
        if duration > 0.0 {
            self.total_damage as f64 / duration
        } else {
            0.0
        }
    }
}

fn add_to(map: &mut BTreeMap<String, i64>, key: &str, amount: i64) {
    match map.get_mut(key) {
        Some(total) => *total += amount,
        None => {
            map.insert(key.to_string(), amount);
        }
    }
}

#[derive(Debug, Clone)]
pub struct SegmentCollector {
    policy: FlushPolicy,
    open: Segment,
    next_index: u32,
}

impl SegmentCollector {
    pub fn new(policy: FlushPolicy, start_time: f64, rng_index: i64) -> Self {
        Self {
            policy,
            open: Segment::open(0, start_time, rng_index),
            next_index: 1,
        }
    }

    pub fn policy(&self) -> FlushPolicy {
        self.policy
    }

    /// The segment currently accumulating.
    pub fn current(&self) -> &Segment {
        &self.open
    }

    pub fn begin_event(&mut self) {
        self.open.event_count += 1;
    }

    pub fn add_damage(&mut self, source: &str, damage_type: &str, amount: i64) {
        self.open.total_damage += amount;
        add_to(&mut self.open.damage_by_source, source, amount);
        add_to(&mut self.open.damage_by_type, damage_type, amount);
    }

    pub fn add_resource(&mut self, resource: &str, delta: i64) {
        add_to(&mut self.open.resource_flow, resource, delta);
    }

    pub fn bump_tag(&mut self, tag: &str) {
        add_to(&mut self.open.tag_counters, tag, 1);
    }

    fn span_boundary(&self) -> Option<f64> {
        self.policy.span().map(|span| self.open.start_time + span)
    }

    /// True when either threshold has been reached at `now`.
    pub fn should_flush(&self, now: f64) -> bool {
        self.open.event_count >= self.policy.max_events.max(1)
            || self.span_boundary().is_some_and(|boundary| now >= boundary)
    }

    /// Closes the open segment at `now` and opens an empty one starting there.
    ///
    /// # Panics
    /// When `now` precedes the segment start.
    pub fn flush(&mut self, now: f64, rng_index: i64) -> Segment {
        assert!(
            now >= self.open.start_time,
            "segment cannot close before it opened: {} > {now}",
            self.open.start_time
        );
        let next = Segment::open(self.next_index, now, rng_index);
        self.next_index += 1;
        let mut closed = std::mem::replace(&mut self.open, next);
        closed.end_time = now;
        closed.rng_index_end = rng_index;
        closed
    }

    /// Closes every span boundary at or before `now`, each at its exact grid time.
    pub fn close_expired(&mut self, now: f64, rng_index: i64) -> Vec<Segment> {
        let mut closed = Vec::new();
        while let Some(boundary) = self.span_boundary() {
            if boundary > now {
                break;
            }
            closed.push(self.flush(boundary, rng_index));
        }
        closed
    }

    /// Count-triggered close at the time of the event that filled the segment.
    pub fn flush_if_full(&mut self, now: f64, rng_index: i64) -> Option<Segment> {
        (self.open.event_count >= self.policy.max_events.max(1))
            .then(|| self.flush(now, rng_index))
    }

    /// Final close on battle completion. Skips a segment that neither holds
    /// events nor covers any time.
    pub fn finish(&mut self, now: f64, rng_index: i64) -> Option<Segment> {
        (self.open.event_count > 0 || now > self.open.start_time)
            .then(|| self.flush(now, rng_index))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy(max_events: u32, max_span: f64) -> FlushPolicy {
        FlushPolicy {
            max_events,
            max_span,
        }
    }

    #[test]
    fn accumulates_into_open_segment() {
        let mut collector = SegmentCollector::new(policy(10, 5.0), 0.0, 0);
        collector.begin_event();
        collector.add_damage("Slash", "physical", 40);
        collector.add_damage("Slash", "physical", 10);
        collector.add_resource("rage", 10);
        collector.bump_tag("crit");
        let open = collector.current();
        assert_eq!(open.event_count, 1);
        assert_eq!(open.total_damage, 50);
        assert_eq!(open.damage_by_source["Slash"], 50);
        assert_eq!(open.resource_flow["rage"], 10);
        assert_eq!(open.tag_counters["crit"], 1);
    }

    #[test]
    fn span_closes_land_on_grid() {
        let mut collector = SegmentCollector::new(policy(100, 5.0), 0.0, 0);
        collector.begin_event();
        let closed = collector.close_expired(12.3, 4);
        let bounds: Vec<(f64, f64)> = closed.iter().map(|s| (s.start_time, s.end_time)).collect();
        assert_eq!(bounds, vec![(0.0, 5.0), (5.0, 10.0)]);
        assert_eq!(collector.current().start_time, 10.0);
        assert_eq!(closed[1].rng_index_start, 4);
    }

    #[test]
    fn count_threshold_closes_at_event_time() {
        let mut collector = SegmentCollector::new(policy(2, 60.0), 0.0, 0);
        collector.begin_event();
        assert!(collector.flush_if_full(1.0, 1).is_none());
        collector.begin_event();
        let closed = collector.flush_if_full(2.5, 3).expect("full segment");
        assert_eq!((closed.start_time, closed.end_time), (0.0, 2.5));
        assert_eq!(closed.rng_draws(), 3);
        assert_eq!(collector.current().index, 1);
    }

    #[test]
    fn finish_skips_empty_zero_width_segment() {
        let mut collector = SegmentCollector::new(policy(2, 60.0), 0.0, 0);
        collector.begin_event();
        collector.begin_event();
        collector.flush_if_full(3.0, 0);
        assert!(collector.finish(3.0, 0).is_none());
        let tail = collector.finish(4.0, 0).expect("time-covering tail");
        assert_eq!(tail.event_count, 0);
        assert_eq!(tail.end_time, 4.0);
    }

    #[test]
    fn zero_width_tail_folds_into_previous_segment() {
        let mut collector = SegmentCollector::new(policy(100, 5.0), 0.0, 0);
        collector.begin_event();
        collector.add_damage("Slash", "physical", 30);
        let mut closed = collector.close_expired(5.0, 2).remove(0);
        collector.begin_event();
        collector.add_damage("Slash", "physical", 12);
        collector.bump_tag("kill");
        let tail = collector.finish(5.0, 3).expect("tail holds an event");
        closed.absorb(tail);
        assert_eq!((closed.start_time, closed.end_time), (0.0, 5.0));
        assert_eq!(closed.event_count, 2);
        assert_eq!(closed.damage_by_source["Slash"], 42);
        assert_eq!(closed.tag_counters["kill"], 1);
        assert_eq!(closed.rng_draws(), 3);
    }

    #[test]
    fn zero_span_disables_span_closes() {
        let mut collector = SegmentCollector::new(policy(3, 0.0), 0.0, 0);
        collector.begin_event();
        assert!(collector.close_expired(1_000.0, 0).is_empty());
        assert!(!collector.should_flush(1_000.0));
    }

    #[test]
    fn should_flush_reports_either_threshold() {
        let mut collector = SegmentCollector::new(policy(1, 5.0), 0.0, 0);
        assert!(!collector.should_flush(1.0));
        assert!(collector.should_flush(5.0));
        collector.begin_event();
        assert!(collector.should_flush(0.5));
    }
}
