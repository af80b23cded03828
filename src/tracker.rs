//! Eye tracker: locate the eye region once, then follow the glints frame by frame.
//!
//! ```text
//! Idle -> Initializing -> Tracking <-> Recovering -> Stopped
//! ```
//!
//! The per-frame loop ([`EyeTracker::start_tracking`]) runs on one thread.
//! [`TrackerControl`] handles pause/resume/stop from any other thread; the loop
//! checks it once per iteration and parks on a condition variable while paused.
//! Notifications go out as [`TrackerEvent`]s on crossbeam channels.

use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread;
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, Sender};
use image::imageops;
use log::{debug, info, warn};

use crate::config::{CenterStrategy, Config, LocatorConfig, TrackerConfig};
use crate::error::{Error, Result};
use crate::geometry::{average, fit_circle, median_by_distance};
use crate::glints::GlintDetector;
use crate::types::{Frame, Point, Point2f, Region, TrackerState};

/// Delivers grayscale frames on demand. May block until a frame is ready.
pub trait FrameSource {
    /// `Ok(None)` means end-of-stream, which is a normal way for tracking to end.
    fn next_gray_frame(&mut self) -> Result<Option<Frame>>;
}

/// Finds the eye region in a full frame (cascade, model, manual, ...).
pub trait RegionLocator {
    fn locate(&mut self, frame: &Frame) -> Option<Region>;
}

/// Notifications for a UI or calibration layer.
#[derive(Debug, Clone, PartialEq)]
pub enum TrackerEvent {
    StateChanged {
        from: TrackerState,
        to: TrackerState,
    },
    /// The search window moved; `center` is the estimate it was moved onto.
    Recentered { region: Region, center: Point },
    /// Glints accepted this frame, in the coordinates of the crop they were found in.
    GlintsAccepted { glints: Vec<Point> },
    /// Tracking ended with an error.
    Failed(String),
}

/// Result of one per-frame iteration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    Tracked,
    Missed,
    Recovered,
    EndOfStream,
}

#[derive(Debug, Default)]
struct ControlFlags {
    paused: bool,
    stopping: bool,
}

/// Cross-thread pause/resume/stop handle for a running tracker.
#[derive(Debug, Clone, Default)]
pub struct TrackerControl {
    inner: Arc<(Mutex<ControlFlags>, Condvar)>,
}

impl TrackerControl {
    pub fn new() -> Self {
        Self::default()
    }

    fn flags(&self) -> MutexGuard<'_, ControlFlags> {
        self.inner.0.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Park the loop at its next iteration boundary. Tracking state is kept.
    pub fn pause(&self) {
        self.flags().paused = true;
    }

    pub fn resume(&self) {
        self.flags().paused = false;
        self.inner.1.notify_all();
    }

    /// Ask the loop to finish its current iteration and stop. Also wakes a paused loop.
    pub fn stop(&self) {
        self.flags().stopping = true;
        self.inner.1.notify_all();
    }

    pub fn is_paused(&self) -> bool {
        self.flags().paused
    }

    /// Block while paused. Returns true when a stop has been requested.
    fn wait_while_paused(&self) -> bool {
        let (lock, cvar) = &*self.inner;
        let guard = lock.lock().unwrap_or_else(PoisonError::into_inner);
        let guard = cvar
            .wait_while(guard, |f| f.paused && !f.stopping)
            .unwrap_or_else(PoisonError::into_inner);
        guard.stopping
    }
}

/// Region plus the eye-center estimate that goes with it.
#[derive(Debug, Clone, Copy)]
struct Track {
    region: Region,
    center: Point,
    /// Previous estimate in the coordinates of the next crop of `region`.
    reference: Point,
}

impl Track {
    /// Freshly located region: the estimate is its middle.
    fn located(region: Region) -> Self {
        Self {
            region,
            center: region.barycenter(),
            reference: Point::new(region.width / 2, region.height / 2),
        }
    }

    /// Move onto a crop-local `center`. When clamping holds the origin back the
    /// reference stays off-middle by the same amount.
    fn recentered(&self, center: Point) -> Self {
        let region = self.region.recentered(center);
        let reference = Point::new(
            center.x - (region.x - self.region.x),
            center.y - (region.y - self.region.y),
        );
        Self {
            region,
            center,
            reference,
        }
    }
}

enum Located {
    Found(Track),
    NotFound { tries: u32 },
    EndOfStream { tries: u32 },
}

pub struct EyeTracker<S, L> {
    source: S,
    locator: L,
    detector: GlintDetector,
    tracker_config: TrackerConfig,
    locator_config: LocatorConfig,
    control: TrackerControl,
    subscribers: Vec<Sender<TrackerEvent>>,
    state: TrackerState,
    track: Option<Track>,
    misses: u32,
}

impl<S: FrameSource, L: RegionLocator> EyeTracker<S, L> {
    pub fn new(source: S, locator: L, config: Config) -> Self {
        Self {
            source,
            locator,
            detector: GlintDetector::new(config.glints),
            tracker_config: config.tracker,
            locator_config: config.locator,
            control: TrackerControl::new(),
            subscribers: Vec::new(),
            state: TrackerState::Idle,
            track: None,
            misses: 0,
        }
    }

    /// Use an existing control handle (e.g. one created before the worker thread).
    pub fn with_control(mut self, control: TrackerControl) -> Self {
        self.control = control;
        self
    }

    /// Send events to an existing channel as well.
    pub fn with_events(mut self, sender: Sender<TrackerEvent>) -> Self {
        self.subscribers.push(sender);
        self
    }

    pub fn control(&self) -> TrackerControl {
        self.control.clone()
    }

    pub fn subscribe(&mut self) -> Receiver<TrackerEvent> {
        let (tx, rx) = crossbeam_channel::unbounded();
        self.subscribers.push(tx);
        rx
    }

    pub fn state(&self) -> TrackerState {
        self.state
    }

    /// Current search window; `None` unless tracking.
    pub fn region(&self) -> Option<Region> {
        self.track.map(|t| t.region)
    }

    /// Current eye-center estimate; `None` unless tracking.
    ///
    /// Right after (re)initialization this is the region's barycenter in frame
    /// coordinates. After an accepted glint set it is the estimate in the
    /// coordinates of the crop it was measured in, which is what recentring consumes.
    pub fn frame_center(&self) -> Option<Point> {
        self.track.map(|t| t.center)
    }

    pub fn consecutive_misses(&self) -> u32 {
        self.misses
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn locator(&self) -> &L {
        &self.locator
    }

    /// Find the eye region, trying up to `max_init_tries` successive frames.
    /// On failure the tracker goes back to `Idle` and may be initialized again.
    pub fn initialize(&mut self) -> Result<()> {
        if self.state != TrackerState::Idle {
            return Err(Error::InvalidState {
                state: self.state,
                operation: "initialize",
            });
        }

        self.transition(TrackerState::Initializing);
        let located = match self.locate_region() {
            Ok(located) => located,
            Err(e) => {
                self.transition(TrackerState::Idle);
                return Err(e);
            }
        };
        match located {
            Located::Found(track) => {
                self.adopt(track);
                self.transition(TrackerState::Tracking);
                Ok(())
            }
            Located::NotFound { tries } | Located::EndOfStream { tries } => {
                self.transition(TrackerState::Idle);
                Err(Error::RegionNotFound { tries })
            }
        }
    }

    /// Initialize if needed, then run the per-frame loop until end-of-stream,
    /// a stop request, or a terminal error.
    pub fn start_tracking(&mut self) -> Result<()> {
        if self.state == TrackerState::Stopped {
            return Err(Error::InvalidState {
                state: self.state,
                operation: "start tracking",
            });
        }
        if self.state == TrackerState::Idle {
            self.initialize()?;
        }
        if let Some(t) = self.track {
            info!(
                "tracking started: region=({}, {}, {}x{}) center=({}, {})",
                t.region.x, t.region.y, t.region.width, t.region.height, t.center.x, t.center.y
            );
        }

        let pace = Duration::from_millis(self.tracker_config.poll_interval_ms);
        loop {
            if self.control.wait_while_paused() {
                info!("stop requested");
                break;
            }

            let started = Instant::now();
            match self.step() {
                Ok(StepOutcome::EndOfStream) => break,
                Ok(_) => {}
                Err(e) => {
                    // Recovery failures have already stopped and reported.
                    if self.state != TrackerState::Stopped {
                        self.fail(&e);
                    }
                    return Err(e);
                }
            }

            let elapsed = started.elapsed();
            if elapsed < pace {
                thread::sleep(pace - elapsed);
            }
        }

        if self.state != TrackerState::Stopped {
            self.transition(TrackerState::Stopped);
        }
        Ok(())
    }

    /// One per-frame iteration: pull, crop, detect, recenter (or count a miss).
    pub fn step(&mut self) -> Result<StepOutcome> {
        let track = match (self.state, self.track) {
            (TrackerState::Tracking | TrackerState::Recovering, Some(track)) => track,
            (state, _) => {
                return Err(Error::InvalidState {
                    state,
                    operation: "step",
                });
            }
        };

        let Some(frame) = self.source.next_gray_frame()? else {
            info!("no more frames");
            self.transition(TrackerState::Stopped);
            return Ok(StepOutcome::EndOfStream);
        };

        let crop = crop_to_region(&frame, &track.region);
        let glints = self.detector.detect(&crop);

        if !glints.is_empty() {
            let center = self.estimate_center(&glints, track.reference)?;
            let next = track.recentered(center);
            let region = next.region;
            debug!(
                "glints={:?} center=({}, {}) region=({}, {})",
                glints, center.x, center.y, region.x, region.y
            );

            self.track = Some(next);
            self.misses = 0;
            self.emit(TrackerEvent::GlintsAccepted { glints });
            self.emit(TrackerEvent::Recentered { region, center });
            return Ok(StepOutcome::Tracked);
        }

        self.misses += 1;
        debug!("no glints ({} consecutive)", self.misses);
        if self.misses <= self.tracker_config.max_consecutive_misses {
            return Ok(StepOutcome::Missed);
        }

        warn!("{} consecutive frames without glints, relocating eye region", self.misses);
        self.recover()
    }

    /// Throw away the current region and run the locator again.
    fn recover(&mut self) -> Result<StepOutcome> {
        self.track = None;
        self.transition(TrackerState::Recovering);

        match self.locate_region()? {
            Located::Found(track) => {
                self.adopt(track);
                self.transition(TrackerState::Tracking);
                info!("recovered eye region");
                Ok(StepOutcome::Recovered)
            }
            Located::NotFound { tries } => {
                let err = Error::TrackingLost { tries };
                self.fail(&err);
                Err(err)
            }
            Located::EndOfStream { .. } => {
                info!("no more frames during recovery");
                self.transition(TrackerState::Stopped);
                Ok(StepOutcome::EndOfStream)
            }
        }
    }

    /// Pull up to `max_init_tries` frames and ask the locator about each.
    fn locate_region(&mut self) -> Result<Located> {
        let max_tries = self.tracker_config.max_init_tries;
        for attempt in 1..=max_tries {
            let Some(frame) = self.source.next_gray_frame()? else {
                return Ok(Located::EndOfStream { tries: attempt - 1 });
            };

            match self.locator.locate(&frame) {
                Some(found) => {
                    let region = Region::new(found.x, found.y, found.width, found.height);
                    if self.is_too_small(&region) {
                        debug!(
                            "attempt {attempt}: region {}x{} below minimum size",
                            region.width, region.height
                        );
                        continue;
                    }
                    return Ok(Located::Found(Track::located(region)));
                }
                None => debug!("attempt {attempt}: no eye region"),
            }
        }
        Ok(Located::NotFound { tries: max_tries })
    }

    fn is_too_small(&self, region: &Region) -> bool {
        region.width < self.locator_config.min_region_width
            || region.height < self.locator_config.min_region_height
    }

    fn adopt(&mut self, track: Track) {
        self.track = Some(track);
        self.misses = 0;
        self.emit(TrackerEvent::Recentered {
            region: track.region,
            center: track.center,
        });
    }

    /// Glints are crop-local, so the estimate is crop-local too. `reference` is
    /// the previous estimate in the same crop coordinates.
    fn estimate_center(&self, glints: &[Point], reference: Point) -> Result<Point> {
        let points: Vec<Point2f> = glints.iter().copied().map(Point2f::from).collect();
        let estimate = match self.tracker_config.center_strategy {
            CenterStrategy::Mean => average(&points)?,
            CenterStrategy::Median => median_by_distance(Point2f::from(reference), &points)?,
            CenterStrategy::CircleFit if points.len() >= 3 => match fit_circle(&points) {
                Ok((center, _radius)) => center,
                Err(e) => {
                    debug!("circle fit failed ({e}), using mean");
                    average(&points)?
                }
            },
            CenterStrategy::CircleFit => average(&points)?,
        };
        Ok(estimate.round())
    }

    /// Terminal failure: stop and tell subscribers, exactly once.
    fn fail(&mut self, err: &Error) {
        warn!("tracking failed: {err}");
        self.transition(TrackerState::Stopped);
        self.emit(TrackerEvent::Failed(err.to_string()));
    }

    fn transition(&mut self, to: TrackerState) {
        let from = self.state;
        if from == to {
            return;
        }
        self.state = to;
        if matches!(to, TrackerState::Idle | TrackerState::Stopped) {
            self.track = None;
        }
        info!("tracker: {from} -> {to}");
        self.emit(TrackerEvent::StateChanged { from, to });
    }

    fn emit(&mut self, event: TrackerEvent) {
        // Receivers that went away are dropped.
        self.subscribers.retain(|tx| tx.send(event.clone()).is_ok());
    }
}

/// Copy of the part of `frame` covered by `region`, clipped to the frame.
fn crop_to_region(frame: &Frame, region: &Region) -> Frame {
    let x = region.x.max(0) as u32;
    let y = region.y.max(0) as u32;
    let w = region.width.max(0) as u32;
    let h = region.height.max(0) as u32;
    imageops::crop_imm(frame, x, y, w, h).to_image()
}
