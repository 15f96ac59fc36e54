//! The step clock: a transport advanced by hand.
//!
//! Tests drive time explicitly with [`StepClock::advance`]; all schedules
//! due inside the advanced window fire synchronously before the call
//! returns, ordered by beat position and then by registration order.
//! Nothing fires while the transport is stopped.

use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::debug;

use patchbay_core::transport::{PartCallback, RepeatCallback};
use patchbay_core::{NoteValue, PartStep, ScheduleId, Transport};

enum ScheduleKind {
    Repeat {
        interval_beats: f64,
        callback: RepeatCallback,
    },
    Part {
        steps: Vec<PartStep>,
        loop_beats: Option<f64>,
        callback: PartCallback,
    },
}

struct Schedule {
    id: ScheduleId,
    /// Beat position when the schedule was registered; step and interval
    /// offsets count from here.
    start_beat: f64,
    kind: ScheduleKind,
}

struct ClockState {
    beat_pos: f64,
    sec_pos: f64,
    bpm: f64,
    schedules: Vec<Schedule>,
}

enum Firing {
    Repeat(RepeatCallback),
    Part(PartCallback, NoteValue),
}

/// Deterministic manual transport.
pub struct StepClock {
    state: Mutex<ClockState>,
    running: AtomicBool,
}

impl StepClock {
    pub fn new(bpm: f64) -> Self {
        StepClock {
            state: Mutex::new(ClockState {
                beat_pos: 0.0,
                sec_pos: 0.0,
                bpm,
                schedules: Vec::new(),
            }),
            running: AtomicBool::new(false),
        }
    }

    /// Move time forward and fire everything due in `[now, now + seconds)`.
    /// A no-op while the transport is stopped; musical time is frozen.
    pub fn advance(&self, seconds: f64) {
        if !self.running.load(Ordering::SeqCst) || seconds <= 0.0 {
            return;
        }

        let mut due: Vec<(f64, usize, Firing)> = Vec::new();
        let (from_sec, from_beat, bpm);
        {
            let mut state = self.state.lock();
            bpm = state.bpm;
            from_beat = state.beat_pos;
            from_sec = state.sec_pos;
            let to_beat = from_beat + seconds * bpm / 60.0;

            for (order, schedule) in state.schedules.iter().enumerate() {
                match &schedule.kind {
                    ScheduleKind::Repeat {
                        interval_beats,
                        callback,
                    } => {
                        let mut k = ((from_beat - schedule.start_beat) / interval_beats)
                            .ceil()
                            .max(0.0);
                        loop {
                            let beat = schedule.start_beat + k * interval_beats;
                            if beat >= to_beat {
                                break;
                            }
                            if beat >= from_beat {
                                due.push((beat, order, Firing::Repeat(callback.clone())));
                            }
                            k += 1.0;
                        }
                    }
                    ScheduleKind::Part {
                        steps,
                        loop_beats,
                        callback,
                    } => {
                        for step in steps {
                            match loop_beats {
                                None => {
                                    let beat = schedule.start_beat + step.beats;
                                    if beat >= from_beat && beat < to_beat {
                                        due.push((
                                            beat,
                                            order,
                                            Firing::Part(callback.clone(), step.value.clone()),
                                        ));
                                    }
                                }
                                Some(period) => {
                                    let mut k = ((from_beat - schedule.start_beat - step.beats)
                                        / period)
                                        .ceil()
                                        .max(0.0);
                                    loop {
                                        let beat =
                                            schedule.start_beat + k * period + step.beats;
                                        if beat >= to_beat {
                                            break;
                                        }
                                        if beat >= from_beat {
                                            due.push((
                                                beat,
                                                order,
                                                Firing::Part(
                                                    callback.clone(),
                                                    step.value.clone(),
                                                ),
                                            ));
                                        }
                                        k += 1.0;
                                    }
                                }
                            }
                        }
                    }
                }
            }

            state.beat_pos = to_beat;
            state.sec_pos = from_sec + seconds;
        }

        // Beat order, then registration order; callbacks run outside the
        // lock so they may schedule or clear freely.
        due.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)));
        for (beat, _, firing) in due {
            let time = from_sec + (beat - from_beat) * 60.0 / bpm;
            match firing {
                Firing::Repeat(callback) => callback(time),
                Firing::Part(callback, value) => callback(time, &value),
            }
        }
    }

    /// Advance by a beat count at the current tempo.
    pub fn advance_beats(&self, beats: f64) {
        let seconds = self.beats_to_seconds(beats);
        self.advance(seconds);
    }

    pub fn schedule_count(&self) -> usize {
        self.state.lock().schedules.len()
    }
}

impl Transport for StepClock {
    fn start(&self) {
        debug!("step clock started");
        self.running.store(true, Ordering::SeqCst);
    }

    fn stop(&self) {
        debug!("step clock stopped");
        self.running.store(false, Ordering::SeqCst);
    }

    fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    fn now(&self) -> f64 {
        self.state.lock().sec_pos
    }

    fn bpm(&self) -> f64 {
        self.state.lock().bpm
    }

    fn set_bpm(&self, bpm: f64) {
        self.state.lock().bpm = bpm;
    }

    fn beats_to_seconds(&self, beats: f64) -> f64 {
        beats * 60.0 / self.state.lock().bpm
    }

    fn schedule_repeat(&self, interval_beats: f64, callback: RepeatCallback) -> ScheduleId {
        let id = ScheduleId::fresh();
        let mut state = self.state.lock();
        let start_beat = state.beat_pos;
        state.schedules.push(Schedule {
            id,
            start_beat,
            kind: ScheduleKind::Repeat {
                interval_beats,
                callback,
            },
        });
        id
    }

    fn schedule_part(
        &self,
        steps: Vec<PartStep>,
        loop_beats: Option<f64>,
        callback: PartCallback,
    ) -> ScheduleId {
        let id = ScheduleId::fresh();
        let mut state = self.state.lock();
        let start_beat = state.beat_pos;
        state.schedules.push(Schedule {
            id,
            start_beat,
            kind: ScheduleKind::Part {
                steps,
                loop_beats,
                callback,
            },
        });
        id
    }

    fn clear(&self, id: ScheduleId) {
        self.state.lock().schedules.retain(|s| s.id != id);
    }
}
