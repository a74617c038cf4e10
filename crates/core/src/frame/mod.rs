//! Per-refresh update and redraw.

use std::{
    thread,
    time::{Duration, Instant},
};

use serde::Serialize;

use crate::{
    context::AppContext,
    timeline::{Clock, ScheduledEvent, Scheduler},
};

/// Yields between ticks until the host's next refresh.
#[derive(Debug, Clone)]
pub enum FramePacer {
    /// Next tick starts right away; used for simulated runs.
    Immediate,
    Interval {
        frame: Duration,
        last: Option<Instant>,
    },
}

impl FramePacer {
    /// Paces at `fps` frames per second. Rates without a representable frame
    /// interval fall back to [`FramePacer::Immediate`].
    pub fn fps(fps: f32) -> Self {
        if fps.is_nan() || fps <= 0.0 {
            return FramePacer::Immediate;
        }
        match Duration::try_from_secs_f32(1.0 / fps) {
            Ok(frame) => FramePacer::Interval { frame, last: None },
            Err(err) => {
                tracing::warn!(fps, %err, "frame rate has no usable interval, not pacing");
                FramePacer::Immediate
            }
        }
    }

    pub fn wait(&mut self) {
        if let FramePacer::Interval { frame, last } = self {
            if let Some(previous) = *last {
                let next = previous + *frame;
                let now = Instant::now();
                if next > now {
                    thread::sleep(next - now);
                }
            }
            *last = Some(Instant::now());
        }
    }
}

/// What happened during one tick.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FrameStats {
    pub index: u64,
    pub elapsed: f32,
    pub models_placed: usize,
    pub events_applied: usize,
    pub camera_moved: bool,
    pub rendered: bool,
}

/// Totals over a [`FrameLoop::run`].
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RunSummary {
    pub frames: u64,
    pub rendered: u64,
    pub failed: u64,
    pub last_elapsed: f32,
}

/// Single-threaded render loop. Each tick runs to completion before the next
/// one starts.
#[derive(Debug)]
pub struct FrameLoop<C> {
    clock: C,
    scheduler: Scheduler,
    frames: u64,
    last_elapsed: f32,
}

impl<C: Clock> FrameLoop<C> {
    pub fn new(clock: C) -> Self {
        Self {
            clock,
            scheduler: Scheduler::new(),
            frames: 0,
            last_elapsed: 0.0,
        }
    }

    pub fn with_events(mut self, events: Vec<ScheduledEvent>) -> Self {
        self.scheduler.set_events(events);
        self
    }

    pub fn frames(&self) -> u64 {
        self.frames
    }

    /// One tick: apply finished loads, read the clock, apply due interaction,
    /// write the shader time, step the camera controls, render.
    pub fn tick(&mut self, ctx: &mut AppContext) -> FrameStats {
        let models_placed = ctx.process_loads();

        let elapsed = self.clock.elapsed_seconds().max(self.last_elapsed);
        self.last_elapsed = elapsed;

        let mut events_applied = 0;
        for action in self.scheduler.due(elapsed) {
            match ctx.apply_action(&action) {
                Ok(()) => events_applied += 1,
                Err(err) => tracing::warn!(%err, ?action, "scheduled action rejected"),
            }
        }

        ctx.set_shader_time(elapsed);
        let camera_moved = ctx.update_controls();

        let rendered = match ctx.render() {
            Ok(()) => true,
            Err(err) => {
                tracing::warn!(frame = self.frames, %err, "frame dropped");
                false
            }
        };

        let stats = FrameStats {
            index: self.frames,
            elapsed,
            models_placed,
            events_applied,
            camera_moved,
            rendered,
        };
        self.frames += 1;
        tracing::trace!(?stats, "tick");
        stats
    }

    /// Runs `frames` ticks, pacing each with `pacer`.
    pub fn run(&mut self, ctx: &mut AppContext, frames: u64, pacer: &mut FramePacer) -> RunSummary {
        let mut summary = RunSummary::default();
        for _ in 0..frames {
            pacer.wait();
            let stats = self.tick(ctx);
            summary.frames += 1;
            if stats.rendered {
                summary.rendered += 1;
            } else {
                summary.failed += 1;
            }
            summary.last_elapsed = stats.elapsed;
        }

        tracing::info!(
            frames = summary.frames,
            failed = summary.failed,
            elapsed = summary.last_elapsed,
            "frame loop finished"
        );
        summary
    }
}

#[cfg(test)]
mod tests {
    use glam::UVec2;
    use rand::{rngs::StdRng, SeedableRng};

    use super::*;
    use crate::{
        config::AppConfig,
        render::{FrameInput, HeadlessBackend, RenderBackend},
        timeline::{Action, SimulatedClock},
        Result, SceneError,
    };

    /// Rejects every other frame.
    struct FlakyBackend {
        calls: u64,
    }

    impl RenderBackend for FlakyBackend {
        fn resize(&mut self, _drawing_buffer: UVec2) -> Result<()> {
            Ok(())
        }

        fn render(&mut self, _frame: &FrameInput<'_>) -> Result<()> {
            self.calls += 1;
            if self.calls % 2 == 0 {
                Err(SceneError::Render("device lost".to_string()))
            } else {
                Ok(())
            }
        }
    }

    /// Runs backwards after its second reading.
    struct StutteringClock {
        readings: Vec<f32>,
    }

    impl Clock for StutteringClock {
        fn elapsed_seconds(&mut self) -> f32 {
            if self.readings.is_empty() {
                0.0
            } else {
                self.readings.remove(0)
            }
        }
    }

    fn context(backend: Box<dyn RenderBackend>) -> AppContext {
        let mut config = AppConfig::default();
        config.assets.model = "missing/scene.gltf".into();
        AppContext::assemble_with_rng(config, backend, &mut StdRng::seed_from_u64(5)).unwrap()
    }

    #[test]
    fn writes_clock_into_shader_before_render() {
        let backend = HeadlessBackend::new();
        let log = backend.log();
        let mut ctx = context(Box::new(backend));
        let mut frame_loop = FrameLoop::new(SimulatedClock::at_fps(10.0));

        let summary = frame_loop.run(&mut ctx, 5, &mut FramePacer::Immediate);
        assert_eq!(summary.frames, 5);
        assert_eq!(summary.failed, 0);

        let times: Vec<_> = log.records().unwrap().iter().map(|r| r.shader_time.unwrap()).collect();
        assert_eq!(times.len(), 5);
        for (index, time) in times.iter().enumerate() {
            assert!((time - index as f32 * 0.1).abs() < 1e-6);
        }
    }

    #[test]
    fn elapsed_time_never_decreases() {
        let mut ctx = context(Box::new(HeadlessBackend::new()));
        let mut frame_loop = FrameLoop::new(StutteringClock {
            readings: vec![0.5, 1.0, 0.25, 2.0],
        });

        let elapsed: Vec<_> = (0..4).map(|_| frame_loop.tick(&mut ctx).elapsed).collect();
        assert_eq!(elapsed, [0.5, 1.0, 1.0, 2.0]);
        assert_eq!(ctx.shader_time(), Some(2.0));
    }

    #[test]
    fn render_failures_only_drop_their_frame() {
        let mut ctx = context(Box::new(FlakyBackend { calls: 0 }));
        let mut frame_loop = FrameLoop::new(SimulatedClock::at_fps(60.0));

        let summary = frame_loop.run(&mut ctx, 6, &mut FramePacer::Immediate);
        assert_eq!(summary.rendered, 3);
        assert_eq!(summary.failed, 3);
        assert_eq!(frame_loop.frames(), 6);
    }

    #[test]
    fn scheduled_actions_land_on_their_tick() {
        let mut ctx = context(Box::new(HeadlessBackend::new()));
        let mut frame_loop = FrameLoop::new(SimulatedClock::at_fps(2.0)).with_events(vec![
            ScheduledEvent::new(1.0, Action::Orbit { dx: 50.0, dy: 0.0 }),
            ScheduledEvent::new(
                1.0,
                Action::Control(crate::controls::ParameterUpdate {
                    target: "nope".to_string(),
                    value: 1.0,
                }),
            ),
        ]);

        let stats: Vec<_> = (0..4).map(|_| frame_loop.tick(&mut ctx)).collect();
        assert_eq!(stats[1].events_applied, 0);
        assert_eq!(stats[2].events_applied, 1);
        assert!(stats[2].camera_moved);
        assert!(!stats[1].camera_moved);
    }

    #[test]
    fn interval_pacer_spaces_ticks() {
        let mut pacer = FramePacer::fps(200.0);
        let start = Instant::now();
        for _ in 0..3 {
            pacer.wait();
        }
        assert!(start.elapsed() >= Duration::from_millis(9));
        assert!(matches!(FramePacer::fps(0.0), FramePacer::Immediate));
    }

    #[test]
    fn unrepresentable_rates_run_unpaced() {
        for fps in [1e-20, f32::MIN_POSITIVE, -30.0, f32::NAN] {
            assert!(matches!(FramePacer::fps(fps), FramePacer::Immediate), "fps {fps}");
        }
        // An infinite rate has a zero interval, which never waits.
        let mut pacer = FramePacer::fps(f32::INFINITY);
        assert!(matches!(pacer, FramePacer::Interval { frame, .. } if frame.is_zero()));
        let start = Instant::now();
        pacer.wait();
        pacer.wait();
        assert!(start.elapsed() < Duration::from_secs(1));
    }
}
