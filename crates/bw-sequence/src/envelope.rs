//! Gain envelope
//!
//! Piecewise-linear curve over a track. Point times are stored relative to
//! the envelope offset; every public method takes track times in seconds.

use serde::{Deserialize, Serialize};

/// Envelope control point
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EnvPoint {
    /// Seconds from the envelope offset
    pub t: f64,
    pub value: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Envelope {
    points: Vec<EnvPoint>,
    offset: f64,
    track_len: f64,
    default_value: f64,
}

impl Default for Envelope {
    fn default() -> Self {
        Self {
            points: Vec::new(),
            offset: 0.0,
            track_len: 0.0,
            default_value: 1.0,
        }
    }
}

impl Envelope {
    pub fn new(default_value: f64) -> Self {
        Self {
            default_value,
            ..Default::default()
        }
    }

    pub fn points(&self) -> &[EnvPoint] {
        &self.points
    }

    pub fn offset(&self) -> f64 {
        self.offset
    }

    pub fn track_len(&self) -> f64 {
        self.track_len
    }

    pub fn default_value(&self) -> f64 {
        self.default_value
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn set_offset(&mut self, offset: f64) {
        self.offset = offset;
    }

    pub fn set_track_len(&mut self, track_len: f64) {
        self.track_len = track_len.max(0.0);
    }

    /// Add a point at track time `t`, replacing any point already there
    pub fn insert(&mut self, t: f64, value: f64) {
        self.insert_local(t - self.offset, value);
    }

    fn insert_local(&mut self, t: f64, value: f64) {
        let idx = self.points.partition_point(|p| p.t < t);
        match self.points.get_mut(idx) {
            Some(p) if p.t == t => p.value = value,
            _ => self.points.insert(idx, EnvPoint { t, value }),
        }
    }

    /// Add a point after any points already at `t`, making a step there
    fn insert_after_local(&mut self, t: f64, value: f64) {
        let idx = self.points.partition_point(|p| p.t <= t);
        self.points.insert(idx, EnvPoint { t, value });
    }

    /// Value at track time `t`
    pub fn value_at(&self, t: f64) -> f64 {
        self.value_at_local(t - self.offset)
    }

    fn value_at_local(&self, t: f64) -> f64 {
        let (Some(first), Some(last)) = (self.points.first(), self.points.last()) else {
            return self.default_value;
        };
        // Of two points at one time, the later one holds from there on
        if t >= last.t {
            return last.value;
        }
        if t < first.t {
            return first.value;
        }

        let idx = self.points.partition_point(|p| p.t <= t);
        let p1 = &self.points[idx - 1];
        let p2 = &self.points[idx];
        let span = p2.t - p1.t;
        if span <= 0.0 {
            return p2.value;
        }
        p1.value + (p2.value - p1.value) * (t - p1.t) / span
    }

    /// Fill `out` with values at `t0`, `t0 + step`, `t0 + 2 * step`, ...
    pub fn values(&self, out: &mut [f64], t0: f64, step: f64) {
        for (i, v) in out.iter_mut().enumerate() {
            *v = self.value_at(t0 + i as f64 * step);
        }
    }

    /// Remove `[t0, t1)` and pull later points back by its length
    pub fn collapse_region(&mut self, t0: f64, t1: f64) {
        if t1 <= t0 {
            return;
        }
        let (t0, t1) = (t0 - self.offset, t1 - self.offset);
        let len = t1 - t0;

        self.points.retain(|p| p.t < t0 || p.t >= t1);
        for p in &mut self.points {
            if p.t >= t1 {
                p.t -= len;
            }
        }
        self.track_len = (self.track_len - len).max(0.0);
    }

    /// Open a gap of `dt` seconds at `t0`, moving later points right
    pub fn expand_region(&mut self, t0: f64, dt: f64) {
        if dt <= 0.0 {
            return;
        }
        let t0 = t0 - self.offset;
        for p in &mut self.points {
            if p.t > t0 {
                p.t += dt;
            }
        }
        self.track_len += dt;
    }

    /// Insert `other` at track time `t0`, moving later points right by its length
    pub fn paste(&mut self, t0: f64, other: &Envelope) {
        let at = t0 - self.offset;
        let len = other.track_len;
        let flat = self.points.is_empty() && other.points.is_empty();
        let outside = self.value_at_local(at);

        self.expand_region(t0, len);
        if len <= 0.0 || (flat && other.default_value == self.default_value) {
            return;
        }

        // Steps at both edges: our own value outside, the pasted curve inside
        if !self.points.iter().any(|p| p.t == at) {
            self.insert_local(at, outside);
        }
        self.insert_after_local(at, other.value_at_local(0.0));
        for p in &other.points {
            if p.t > 0.0 && p.t < len {
                self.insert_local(at + p.t, p.value);
            }
        }
        self.insert_local(at + len, other.value_at_local(len));
        self.insert_after_local(at + len, outside);
    }

    /// Remove every point and hold `value`
    pub fn flatten(&mut self, value: f64) {
        self.points.clear();
        self.default_value = value;
    }

    /// Become the portion of `other` between track times `t0` and `t1`
    pub fn copy_from(&mut self, other: &Envelope, t0: f64, t1: f64) {
        let len = (t1 - t0).max(0.0);
        let start = t0 - other.offset;

        self.points.clear();
        self.default_value = other.default_value;
        self.offset = 0.0;
        self.track_len = len;

        if other.points.is_empty() {
            return;
        }
        self.insert_local(0.0, other.value_at_local(start));
        for p in &other.points {
            let t = p.t - start;
            if t > 0.0 && t < len {
                self.insert_local(t, p.value);
            }
        }
        self.insert_local(len, other.value_at_local(start + len));
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// TESTS
// ═══════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn ramp() -> Envelope {
        let mut env = Envelope::new(1.0);
        env.set_track_len(10.0);
        env.insert(0.0, 0.0);
        env.insert(10.0, 1.0);
        env
    }

    #[test]
    fn test_empty_envelope_holds_default() {
        let env = Envelope::new(0.5);
        assert_relative_eq!(env.value_at(3.0), 0.5);
    }

    #[test]
    fn test_insert_replaces_same_time() {
        let mut env = Envelope::default();
        env.insert(1.0, 0.2);
        env.insert(1.0, 0.8);
        assert_eq!(env.len(), 1);
        assert_relative_eq!(env.value_at(1.0), 0.8);
    }

    #[test]
    fn test_linear_interpolation() {
        let env = ramp();
        assert_relative_eq!(env.value_at(2.5), 0.25);
        assert_relative_eq!(env.value_at(-1.0), 0.0);
        assert_relative_eq!(env.value_at(12.0), 1.0);
    }

    #[test]
    fn test_offset_shifts_curve() {
        let mut env = ramp();
        env.set_offset(5.0);
        assert_relative_eq!(env.value_at(10.0), 0.5);
    }

    #[test]
    fn test_values_fills_buffer() {
        let env = ramp();
        let mut out = [0.0; 5];
        env.values(&mut out, 0.0, 2.5);
        assert_relative_eq!(out[0], 0.0);
        assert_relative_eq!(out[2], 0.5);
        assert_relative_eq!(out[4], 1.0);
    }

    #[test]
    fn test_collapse_region_shifts_later_points() {
        let mut env = Envelope::default();
        env.set_track_len(10.0);
        env.insert(2.0, 0.5);
        env.insert(8.0, 0.25);
        env.collapse_region(4.0, 6.0);

        assert_relative_eq!(env.track_len(), 8.0);
        assert_relative_eq!(env.value_at(6.0), 0.25);
        assert!(env.points().iter().all(|p| p.t <= 8.0));
    }

    #[test]
    fn test_expand_region() {
        let mut env = ramp();
        env.expand_region(5.0, 5.0);
        assert_relative_eq!(env.track_len(), 15.0);
        assert_relative_eq!(env.value_at(15.0), 1.0);
        assert_relative_eq!(env.value_at(2.5), 0.25);
    }

    #[test]
    fn test_paste_inserts_other_curve() {
        let mut env = Envelope::default();
        env.set_track_len(4.0);

        let mut other = Envelope::default();
        other.set_track_len(2.0);
        other.insert(0.0, 0.0);
        other.insert(2.0, 0.5);

        env.paste(1.0, &other);
        assert_relative_eq!(env.track_len(), 6.0);
        assert_relative_eq!(env.value_at(0.5), 1.0);
        assert_relative_eq!(env.value_at(1.0), 0.0);
        assert_relative_eq!(env.value_at(2.0), 0.25);
        assert_relative_eq!(env.value_at(2.999), 0.49975, epsilon = 1e-9);
        assert_relative_eq!(env.value_at(3.0), 1.0);
    }

    #[test]
    fn test_paste_keeps_own_value_at_paste_point() {
        let mut env = ramp();
        let mut other = Envelope::default();
        other.set_track_len(2.0);
        other.insert(0.0, 0.2);
        other.insert(2.0, 0.2);

        env.paste(5.0, &other);
        assert_relative_eq!(env.track_len(), 12.0);
        assert_relative_eq!(env.value_at(4.0), 0.4);
        assert_relative_eq!(env.value_at(4.999), 0.4999, epsilon = 1e-9);
        assert_relative_eq!(env.value_at(5.0), 0.2);
        assert_relative_eq!(env.value_at(6.0), 0.2);
        // Our curve resumes from the value it had at the paste point
        assert_relative_eq!(env.value_at(7.0), 0.5);
        assert_relative_eq!(env.value_at(9.5), 0.75);
        assert_relative_eq!(env.value_at(12.0), 1.0);
    }

    #[test]
    fn test_paste_at_existing_point_keeps_it() {
        let mut env = ramp();
        env.insert(5.0, 0.9);
        let mut other = Envelope::new(0.1);
        other.set_track_len(1.0);

        env.paste(5.0, &other);
        assert_relative_eq!(env.value_at(4.999), 0.9, epsilon = 1e-3);
        assert!(env.points().iter().any(|p| p.t == 5.0 && p.value == 0.9));
        assert_relative_eq!(env.value_at(5.5), 0.1);
        assert_relative_eq!(env.value_at(6.0), 0.9);
    }

    #[test]
    fn test_paste_flat_into_flat_adds_no_points() {
        let mut env = Envelope::default();
        let mut other = Envelope::default();
        other.set_track_len(3.0);
        env.paste(0.0, &other);
        assert!(env.is_empty());
        assert_relative_eq!(env.track_len(), 3.0);
    }

    #[test]
    fn test_copy_from_takes_window() {
        let env = ramp();
        let mut part = Envelope::default();
        part.copy_from(&env, 2.0, 6.0);

        assert_relative_eq!(part.track_len(), 4.0);
        assert_relative_eq!(part.value_at(0.0), 0.2);
        assert_relative_eq!(part.value_at(4.0), 0.6);
    }

    #[test]
    fn test_flatten() {
        let mut env = ramp();
        env.flatten(0.3);
        assert!(env.is_empty());
        assert_relative_eq!(env.value_at(7.0), 0.3);
    }

    #[test]
    fn test_serde_round_trip() {
        let env = ramp();
        let json = serde_json::to_string(&env).unwrap();
        let back: Envelope = serde_json::from_str(&json).unwrap();
        assert_eq!(back, env);
    }
}
