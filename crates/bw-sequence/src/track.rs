//! WaveTrack - time-based editing over one sequence
//!
//! A track places a sequence at a time offset and carries its gain envelope.
//! Both sit behind one mutex so every edit is applied to the pair at once.

use std::sync::Arc;

use bw_core::{
    SampleBuffer, SampleCount, SampleFormat, samples_to_time, time_to_samples, time_to_samples_clamped,
};
use bw_store::{BlockStats, DirManager};
use parking_lot::{MappedMutexGuard, Mutex, MutexGuard};

use crate::envelope::Envelope;
use crate::record::{LoadReport, TrackRecord};
use crate::sequence::{Sequence, WaveDisplay};
use crate::{SequenceError, SequenceResult};

struct TrackState {
    offset: f64,
    sequence: Sequence,
    envelope: Envelope,
}

impl TrackState {
    /// Sample range covered by track times `[t0, t1)`, clamped to the sequence
    fn range(&self, t0: f64, t1: f64, rate: f64) -> (SampleCount, SampleCount) {
        let n = self.sequence.num_samples();
        let s0 = time_to_samples_clamped(t0 - self.offset, rate, n);
        let s1 = time_to_samples_clamped(t1 - self.offset, rate, n);
        (s0, s1.max(s0))
    }

    fn time_of(&self, sample: SampleCount, rate: f64) -> f64 {
        self.offset + samples_to_time(sample, rate)
    }

    fn sync_envelope(&mut self, rate: f64) {
        self.envelope.set_offset(self.offset);
        self.envelope
            .set_track_len(samples_to_time(self.sequence.num_samples(), rate));
    }
}

pub struct WaveTrack {
    name: String,
    rate: f64,
    state: Mutex<TrackState>,
}

impl WaveTrack {
    pub fn new(dir: &Arc<DirManager>, name: impl Into<String>, format: SampleFormat, rate: f64) -> Self {
        Self::from_parts(name.into(), rate, 0.0, Sequence::new(dir, format), Envelope::default())
    }

    fn from_parts(name: String, rate: f64, offset: f64, sequence: Sequence, envelope: Envelope) -> Self {
        let mut state = TrackState {
            offset,
            sequence,
            envelope,
        };
        state.sync_envelope(rate);
        Self {
            name,
            rate,
            state: Mutex::new(state),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn rate(&self) -> f64 {
        self.rate
    }

    pub fn offset(&self) -> f64 {
        self.state.lock().offset
    }

    pub fn set_offset(&self, offset: f64) {
        let mut state = self.state.lock();
        state.offset = offset;
        state.sync_envelope(self.rate);
    }

    pub fn num_samples(&self) -> SampleCount {
        self.state.lock().sequence.num_samples()
    }

    pub fn start_time(&self) -> f64 {
        self.offset()
    }

    pub fn end_time(&self) -> f64 {
        let state = self.state.lock();
        state.time_of(state.sequence.num_samples(), self.rate)
    }

    /// Hold the track lock and look at its sequence
    pub fn sequence(&self) -> MappedMutexGuard<'_, Sequence> {
        MutexGuard::map(self.state.lock(), |state| &mut state.sequence)
    }

    pub fn envelope(&self) -> Envelope {
        self.state.lock().envelope.clone()
    }

    pub fn insert_envelope_point(&self, t: f64, value: f64) {
        self.state.lock().envelope.insert(t, value);
    }

    // ───────────────────────────────────────────────────────────────────────
    // Editing
    // ───────────────────────────────────────────────────────────────────────

    /// New track holding `[t0, t1)`, sharing whole blocks with this one
    pub fn copy(&self, t0: f64, t1: f64) -> SequenceResult<WaveTrack> {
        let state = self.state.lock();
        let (s0, s1) = state.range(t0, t1, self.rate);
        let sequence = state.sequence.copy(s0, s1)?;
        let mut envelope = Envelope::default();
        envelope.copy_from(
            &state.envelope,
            state.time_of(s0, self.rate),
            state.time_of(s1, self.rate),
        );
        Ok(Self::from_parts(self.name.clone(), self.rate, 0.0, sequence, envelope))
    }

    /// Remove `[t0, t1)`, closing the gap
    pub fn clear(&self, t0: f64, t1: f64) -> SequenceResult<()> {
        let mut state = self.state.lock();
        let (s0, s1) = state.range(t0, t1, self.rate);
        if s1 == s0 {
            return Ok(());
        }
        state.sequence.delete(s0, s1 - s0)?;
        let (c0, c1) = (state.time_of(s0, self.rate), state.time_of(s1, self.rate));
        state.envelope.collapse_region(c0, c1);
        state.sync_envelope(self.rate);
        Ok(())
    }

    /// Copy then clear
    pub fn cut(&self, t0: f64, t1: f64) -> SequenceResult<WaveTrack> {
        let part = self.copy(t0, t1)?;
        self.clear(t0, t1)?;
        Ok(part)
    }

    /// Insert the contents of `other` at `t0`.
    ///
    /// `other` may be this same track. Samples are taken as they are; the
    /// two tracks are expected to share a rate.
    pub fn paste(&self, t0: f64, other: &WaveTrack) -> SequenceResult<()> {
        // Snapshot first: `other` and `self` may be the same mutex
        let (sequence, envelope) = {
            let other_state = other.state.lock();
            (other_state.sequence.clone(), other_state.envelope.clone())
        };
        if (other.rate - self.rate).abs() > f64::EPSILON {
            log::warn!(
                "[WaveTrack] Pasting {} Hz material into a {} Hz track",
                other.rate,
                self.rate
            );
        }

        let mut state = self.state.lock();
        if state.sequence.is_empty() {
            state.offset = t0;
            state.sync_envelope(self.rate);
        }
        let at = state.range(t0, t0, self.rate).0;
        state.sequence.paste(at, &sequence)?;
        let t = state.time_of(at, self.rate);
        state.envelope.paste(t, &envelope);
        state.sync_envelope(self.rate);
        Ok(())
    }

    /// Overwrite `[t0, t1)` with silence
    pub fn silence(&self, t0: f64, t1: f64) -> SequenceResult<()> {
        let mut state = self.state.lock();
        let (s0, s1) = state.range(t0, t1, self.rate);
        state.sequence.set_silence(s0, s1 - s0)
    }

    /// Insert `duration` seconds of silence at `t`; negative durations insert nothing
    pub fn insert_silence(&self, t: f64, duration: f64) -> SequenceResult<()> {
        let len = time_to_samples(duration, self.rate);
        let mut state = self.state.lock();
        let at = state.range(t, t, self.rate).0;
        state.sequence.insert_silence(at, len)?;
        let t = state.time_of(at, self.rate);
        state.envelope.expand_region(t, samples_to_time(len, self.rate));
        state.sync_envelope(self.rate);
        Ok(())
    }

    /// Append samples at the end of the track
    pub fn append(&self, data: &SampleBuffer) -> SequenceResult<()> {
        let mut state = self.state.lock();
        state.sequence.append(data)?;
        state.sync_envelope(self.rate);
        Ok(())
    }

    // ───────────────────────────────────────────────────────────────────────
    // Reading
    // ───────────────────────────────────────────────────────────────────────

    /// Samples covering `[t0, t1)`
    pub fn get(&self, t0: f64, t1: f64) -> SequenceResult<SampleBuffer> {
        let state = self.state.lock();
        let (s0, s1) = state.range(t0, t1, self.rate);
        state.sequence.get(s0, s1 - s0)
    }

    pub fn get_min_max(&self, t0: f64, t1: f64) -> SequenceResult<BlockStats> {
        let state = self.state.lock();
        let (s0, s1) = state.range(t0, t1, self.rate);
        state.sequence.get_min_max(s0, s1 - s0)
    }

    /// `pixels` columns starting at `t0`
    pub fn get_wave_display(
        &self,
        t0: f64,
        pixels: usize,
        pixels_per_second: f64,
    ) -> SequenceResult<WaveDisplay> {
        let state = self.state.lock();
        let where_: Vec<SampleCount> = (0..=pixels)
            .map(|i| time_to_samples(t0 + i as f64 / pixels_per_second - state.offset, self.rate))
            .collect();
        state.sequence.get_wave_display(&where_)
    }

    /// Envelope gain at `t0`, `t0 + step`, ...
    pub fn envelope_values(&self, out: &mut [f64], t0: f64, step: f64) {
        self.state.lock().envelope.values(out, t0, step);
    }

    // ───────────────────────────────────────────────────────────────────────
    // Saved state
    // ───────────────────────────────────────────────────────────────────────

    pub fn lock(&self) {
        self.state.lock().sequence.lock();
    }

    pub fn unlock(&self) {
        self.state.lock().sequence.unlock();
    }

    pub fn to_record(&self) -> SequenceResult<TrackRecord> {
        let state = self.state.lock();
        Ok(TrackRecord {
            name: self.name.clone(),
            rate: self.rate,
            offset: state.offset,
            sequence: state.sequence.to_record()?,
            envelope: state.envelope.clone(),
        })
    }

    pub fn from_record(dir: &Arc<DirManager>, record: &TrackRecord) -> SequenceResult<(WaveTrack, LoadReport)> {
        if record.rate.is_nan() || record.rate <= 0.0 {
            return Err(SequenceError::InvalidRecord(format!("track rate {}", record.rate)));
        }
        let (sequence, report) = Sequence::from_record(dir, &record.sequence)?;
        let track = Self::from_parts(
            record.name.clone(),
            record.rate,
            record.offset,
            sequence,
            record.envelope.clone(),
        );
        Ok((track, report))
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// TESTS
// ═══════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use bw_store::StorageConfig;
    use tempfile::TempDir;

    const RATE: f64 = 1000.0;

    fn setup() -> (TempDir, Arc<DirManager>) {
        let tmp = TempDir::new().unwrap();
        let mut config = StorageConfig::with_temp_dir(tmp.path().join("temp"));
        config.max_disk_block_size = 4000;
        config.decode_workers = 0;
        let dir = DirManager::new(config).unwrap();
        (tmp, dir)
    }

    fn ramp_track(dir: &Arc<DirManager>, len: usize) -> WaveTrack {
        let track = WaveTrack::new(dir, "ramp", SampleFormat::Float32, RATE);
        let samples: Vec<f32> = (0..len).map(|i| i as f32 / len as f32).collect();
        track
            .append(&SampleBuffer::from_f32(SampleFormat::Float32, &samples))
            .unwrap();
        track
    }

    #[test]
    fn test_times_round_to_samples() {
        let (_tmp, dir) = setup();
        let track = ramp_track(&dir, 3000);
        assert_relative_eq!(track.end_time(), 3.0);

        // 0.0004 s rounds to sample 0, 0.0006 s to sample 1
        assert_eq!(track.get(0.0004, 0.0016).unwrap().len(), 2);
        assert_eq!(track.get(-1.0, 10.0).unwrap().len(), 3000);
    }

    #[test]
    fn test_cut_and_paste_back() {
        let (_tmp, dir) = setup();
        let track = ramp_track(&dir, 3000);
        let before = track.get(0.0, 3.0).unwrap();

        let part = track.cut(1.0, 2.0).unwrap();
        assert_eq!(part.num_samples(), 1000);
        assert_eq!(track.num_samples(), 2000);

        track.paste(1.0, &part).unwrap();
        assert_eq!(track.get(0.0, 3.0).unwrap(), before);
    }

    #[test]
    fn test_paste_self() {
        let (_tmp, dir) = setup();
        let track = ramp_track(&dir, 1000);
        track.paste(1.0, &track).unwrap();
        assert_eq!(track.num_samples(), 2000);
        assert_eq!(track.get(1.0, 2.0).unwrap(), track.get(0.0, 1.0).unwrap());
    }

    #[test]
    fn test_paste_into_empty_track_sets_offset() {
        let (_tmp, dir) = setup();
        let source = ramp_track(&dir, 500);
        let track = WaveTrack::new(&dir, "empty", SampleFormat::Float32, RATE);
        track.paste(2.0, &source).unwrap();
        assert_relative_eq!(track.start_time(), 2.0);
        assert_eq!(track.get(2.0, 2.5).unwrap(), source.get(0.0, 0.5).unwrap());
    }

    #[test]
    fn test_silence_and_insert_silence() {
        let (_tmp, dir) = setup();
        let track = ramp_track(&dir, 2000);
        track.silence(0.5, 1.0).unwrap();
        let stats = track.get_min_max(0.5, 1.0).unwrap();
        assert_eq!(stats.min, 0.0);
        assert_eq!(stats.max, 0.0);

        track.insert_silence(1.0, 0.25).unwrap();
        assert_eq!(track.num_samples(), 2250);
        assert!(track.get(1.0, 1.25).unwrap().to_f32().iter().all(|&v| v == 0.0));
    }

    #[test]
    fn test_clear_collapses_envelope() {
        let (_tmp, dir) = setup();
        let track = ramp_track(&dir, 3000);
        track.insert_envelope_point(0.0, 0.0);
        track.insert_envelope_point(3.0, 1.0);

        track.clear(1.0, 2.0).unwrap();
        let envelope = track.envelope();
        assert_relative_eq!(envelope.track_len(), 2.0);
        assert_relative_eq!(envelope.value_at(2.0), 1.0);

        let mut out = [0.0; 2];
        track.envelope_values(&mut out, 0.0, 2.0);
        assert_relative_eq!(out[1], 1.0);
    }

    #[test]
    fn test_wave_display_columns() {
        let (_tmp, dir) = setup();
        let track = ramp_track(&dir, 2000);
        let display = track.get_wave_display(0.0, 6, 2.0).unwrap();
        assert_eq!(display.len(), 6);
        assert!(display.max[0] < display.max[1]);
        assert!(display.max[2] < display.max[3]);
        assert!(display.min[1] <= display.max[1]);
        // Right of the track end
        assert_eq!(display.max[4], 0.0);
        assert_eq!(display.rms[5], 0.0);
    }

    #[test]
    fn test_record_round_trip() {
        let (_tmp, dir) = setup();
        let track = ramp_track(&dir, 2500);
        track.set_offset(1.5);
        let record = track.to_record().unwrap();

        let (loaded, report) = WaveTrack::from_record(&dir, &record).unwrap();
        assert!(report.is_complete());
        assert_relative_eq!(loaded.offset(), 1.5);
        assert_eq!(loaded.get(0.0, 10.0).unwrap(), track.get(0.0, 10.0).unwrap());
    }
}
