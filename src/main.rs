// What you SEE:
// • The grayscale webcam image the tracker works on.
// • A rectangle around the eye search region; it follows your glints.
// • Small crosshairs on each accepted glint, a bigger one on the eye center.
// • SPACE pauses/resumes tracking. ESC (or closing the window) stops it.
//
// Put your eye in the middle of the picture with two IR/LED reflections on the cornea.
// Set GLINT_TRACKER_CONFIG=path/to/config.toml to override the defaults.

use std::sync::{Arc, Mutex, PoisonError};
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{Context, anyhow};
use crossbeam_channel::{Receiver, bounded, unbounded};
use log::{debug, error, info, warn};

use glint_tracker::camera::CameraCapture;
use glint_tracker::draw::{Drawer, draw_crosshair, draw_rect, draw_text_5x7, gray_to_buffer};
use glint_tracker::types::FrameBuffer;
use glint_tracker::{
    CenterRegionLocator, Config, EyeTracker, Frame, FrameSource, Point, Region, TrackerControl,
    TrackerEvent, TrackerState,
};

const CONFIG_ENV: &str = "GLINT_TRACKER_CONFIG";

type SharedFrame = Arc<Mutex<Option<Frame>>>;

/// Passes frames through to the tracker and keeps a copy of the latest one for the window.
struct PreviewSource<S> {
    inner: S,
    latest: SharedFrame,
}

impl<S: FrameSource> FrameSource for PreviewSource<S> {
    fn next_gray_frame(&mut self) -> glint_tracker::Result<Option<Frame>> {
        let frame = self.inner.next_gray_frame()?;
        if let Some(f) = &frame {
            *self.latest.lock().unwrap_or_else(PoisonError::into_inner) = Some(f.clone());
        }
        Ok(frame)
    }
}

/// What the window knows about the tracker, rebuilt from events.
#[derive(Default)]
struct View {
    state: TrackerState,
    region: Option<Region>,
    center: Option<Point>,
    glints: Vec<Point>, // frame coordinates
}

impl View {
    fn apply(&mut self, event: TrackerEvent) {
        match event {
            TrackerEvent::StateChanged { to, .. } => {
                self.state = to;
                if to != TrackerState::Tracking {
                    self.glints.clear();
                }
            }
            TrackerEvent::GlintsAccepted { glints } => {
                // Glints are local to the region they were found in (before it moves).
                let origin = self.region.map(|r| (r.x, r.y)).unwrap_or((0, 0));
                self.glints = glints
                    .into_iter()
                    .map(|g| Point::new(origin.0 + g.x, origin.1 + g.y))
                    .collect();
            }
            TrackerEvent::Recentered { region, .. } => {
                self.region = Some(region);
                self.center = Some(region.barycenter());
            }
            TrackerEvent::Failed(reason) => warn!("tracker failed: {reason}"),
        }
    }
}

fn load_config() -> anyhow::Result<Config> {
    match std::env::var(CONFIG_ENV) {
        Ok(path) => {
            let config =
                Config::load(&path).with_context(|| format!("loading config from {path}"))?;
            info!("config loaded from {path}");
            Ok(config)
        }
        Err(_) => Ok(Config::default()),
    }
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = load_config()?;

    /* --- Tracker worker ---
       The camera is opened on the worker thread; it reports the resolution back. */
    let control = TrackerControl::new();
    let (events_tx, events_rx) = unbounded();
    let (ready_tx, ready_rx) = bounded::<Result<(u32, u32), String>>(1);
    let latest: SharedFrame = Arc::new(Mutex::new(None));

    let worker = {
        let control = control.clone();
        let latest = Arc::clone(&latest);
        thread::spawn(move || -> glint_tracker::Result<()> {
            let cam = match CameraCapture::new(0, 640, 480) {
                Ok(cam) => cam,
                Err(e) => {
                    let _ = ready_tx.send(Err(e.to_string()));
                    return Err(e);
                }
            };
            let _ = ready_tx.send(Ok(cam.resolution()));

            let locator = CenterRegionLocator::new(&config.locator);
            let source = PreviewSource { inner: cam, latest };
            let mut tracker = EyeTracker::new(source, locator, config)
                .with_control(control)
                .with_events(events_tx);
            tracker.start_tracking()
        })
    };

    let (w, h) = ready_rx
        .recv()
        .context("tracker thread exited before opening the camera")?
        .map_err(|e| anyhow!(e))?;

    /* --- Window + reusable screen buffer --- */
    let mut drawer = Drawer::new("Glint Tracker", w as usize, h as usize)?;
    let mut screen = FrameBuffer::new(w as usize, h as usize);

    let result = run_window(&mut drawer, &mut screen, &events_rx, &latest, &control, &worker);

    /* --- Shutdown: stop (also wakes a paused loop) and wait for the worker --- */
    control.stop();
    match worker.join() {
        Ok(Ok(())) => info!("tracker stopped"),
        Ok(Err(e)) => error!("tracker ended with error: {e}"),
        Err(_) => error!("tracker thread panicked"),
    }
    result
}

fn run_window(
    drawer: &mut Drawer,
    screen: &mut FrameBuffer,
    events: &Receiver<TrackerEvent>,
    latest: &SharedFrame,
    control: &TrackerControl,
    worker: &thread::JoinHandle<glint_tracker::Result<()>>,
) -> anyhow::Result<()> {
    let mut view = View::default();
    let mut last_frame: Option<Frame> = None;

    /* --- HUD / FPS --- */
    let mut last_fps_time = Instant::now();
    let mut frames_this_second: u32 = 0;
    let mut hud_fps_text = String::from("FPS: 0.0");

    while drawer.is_open() && !drawer.esc_pressed() && !worker.is_finished() {
        // 1) Fold in everything the tracker reported since the last redraw.
        for event in events.try_iter() {
            view.apply(event);
        }

        // 2) Inputs
        if drawer.space_pressed_once() {
            if control.is_paused() {
                control.resume();
            } else {
                control.pause();
            }
        }

        // 3) Base image: the last frame the tracker pulled. While paused nothing new
        //    arrives and the previous picture stays up.
        if let Some(fresh) = latest.lock().unwrap_or_else(PoisonError::into_inner).take() {
            last_frame = Some(fresh);
            frames_this_second += 1;
        }
        if let Some(frame) = &last_frame {
            gray_to_buffer(frame, screen);

            // 4) Overlays: region, glints, center.
            if let Some(region) = view.region {
                draw_rect(screen, &region, 0x00_33_CC_FF);
            }
            for g in &view.glints {
                draw_crosshair(screen, g.x, g.y, 4, 0x00_FF_CC_33);
            }
            if let Some(c) = view.center {
                draw_crosshair(screen, c.x, c.y, 10, 0x00_33_FF_33);
            }

            let status = if control.is_paused() {
                "PAUSED".to_string()
            } else {
                view.state.to_string().to_uppercase()
            };
            let hud = format!("{status} | {hud_fps_text}");
            draw_text_5x7(screen, 8, 8, &hud, 0x00_FF_FF_FF);
        }

        // 5) Present to the window (also pumps keyboard events, so always do it).
        drawer.present(screen)?;

        // 6) FPS counter once per second.
        let now = Instant::now();
        if now.duration_since(last_fps_time) >= Duration::from_secs(1) {
            let secs = now.duration_since(last_fps_time).as_secs_f32();
            let fps = frames_this_second as f32 / secs;
            debug!("FPS: {fps:.1}");
            hud_fps_text = format!("FPS: {fps:.1}");
            frames_this_second = 0;
            last_fps_time = now;
        }
    }
    Ok(())
}
