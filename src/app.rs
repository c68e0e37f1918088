use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::Instant;
use crate::config::Settings;
use crate::core::audio::AudioOutput;
use crate::core::dispatch::TickDispatcher;
use crate::core::judge::{Chart, JudgmentEngine, Scoreboard};
use crate::core::midi::{DeviceManager, EventSourceAdapter, InputBackend, ScriptedPerformer};
use crate::core::synth::Synth;
use crate::messaging::{event_queue, GameHooks, QueueStats};
use crate::utils::helpers::format_time;

/// Extra time after the last note for release tails and late judgments
const TAIL_SECONDS: f64 = 1.0;

/// One play session: the tick dispatcher plus the input side that feeds it
pub struct GameApp {
    settings: Settings,
    dispatcher: TickDispatcher,
    adapter: EventSourceAdapter,
    queue_stats: Arc<QueueStats>,
    chart_end: f64,
    sample_rate: u32,
    samples_rendered: u64,
    block: Vec<f32>,
}

impl GameApp {
    /// Build the engines for output at `sample_rate` and load `chart`
    pub fn new(settings: Settings, chart: Chart, sample_rate: u32, hooks: Box<dyn GameHooks>) -> Self {
        log::info!("[MAIN] creating session '{}' ({} notes)", chart.title, chart.notes.len());

        let (producer, consumer) = event_queue(settings.queue_capacity);
        let adapter = EventSourceAdapter::new(producer);
        let queue_stats = consumer.stats();

        let mut synth = Synth::new(settings.synth_config(sample_rate));
        if settings.precompute_tables {
            synth.precompute_all();
        }

        let chart = chart.delayed(settings.lead_in);
        let chart_end = chart.end_time();
        let mut judge = JudgmentEngine::new(settings.judge_config());
        judge.load(chart.notes);

        let dispatcher = TickDispatcher::new(consumer, synth, judge, hooks, settings.events_per_tick);

        Self {
            settings,
            dispatcher,
            adapter,
            queue_stats,
            chart_end,
            sample_rate,
            samples_rendered: 0,
            block: Vec::new(),
        }
    }

    /// Handle for anything that produces input events
    pub fn adapter(&self) -> EventSourceAdapter {
        self.adapter.clone()
    }

    pub fn dispatcher(&self) -> &TickDispatcher {
        &self.dispatcher
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Latest time the session can run when no explicit duration is given
    pub fn session_limit(&self) -> f64 {
        self.chart_end + self.settings.note_lifetime + self.settings.release_time + TAIL_SECONDS
    }

    fn announce_background(&mut self) {
        if let Some(clip) = self.settings.background_clip() {
            log::info!("[MAIN] background track {}", clip.path.display());
            self.dispatcher.announce_background(&clip);
        }
    }

    /// One tick at `now`, then render audio up to `render_until`
    pub fn step(&mut self, now: f64, render_until: f64, output: &mut dyn AudioOutput) -> Result<()> {
        let report = self.dispatcher.tick(now);
        for record in &report.judgments {
            log::debug!("[MAIN] judged {:?} at {}", record.tier, format_time(record.scheduled_time));
        }

        let target = (render_until.max(0.0) * self.sample_rate as f64).floor() as u64;
        if target > self.samples_rendered {
            let count = (target - self.samples_rendered) as usize;
            self.block.resize(count, 0.0);
            let start_time = self.samples_rendered as f64 / self.sample_rate as f64;
            self.dispatcher.render(start_time, &mut self.block);
            output.write(&self.block).context("writing audio block")?;
            self.samples_rendered = target;
        }
        Ok(())
    }

    fn is_done(&self, now: f64, duration: Option<f64>) -> bool {
        match duration {
            Some(limit) => now >= limit,
            None => {
                let idle = self.dispatcher.judge().is_finished()
                    && self.dispatcher.synth().active_voice_count() == 0
                    && now >= self.chart_end;
                idle || now >= self.session_limit()
            },
        }
    }

    /// Run in real time until the chart is over or `duration` seconds pass.
    ///
    /// When a device manager is given it is polled every tick so a lost
    /// keyboard is picked up again without stopping the session.
    pub fn run_live<B: InputBackend>(
        &mut self,
        output: &mut dyn AudioOutput,
        mut device: Option<&mut DeviceManager<B>>,
        duration: Option<f64>,
    ) -> Result<Scoreboard> {
        let interval = self.settings.tick_interval();
        let ahead = interval.as_secs_f64() * 2.0;
        log::info!("[MAIN] running live at {} ticks/s", self.settings.tick_rate);

        self.announce_background();
        let start = Instant::now();
        let mut next_tick = start;

        loop {
            let tick_started = Instant::now();
            if let Some(device) = device.as_deref_mut() {
                device.poll(tick_started);
            }

            let now = tick_started.duration_since(start).as_secs_f64();
            self.step(now, now + ahead, output)?;
            if self.is_done(now, duration) {
                break;
            }

            next_tick += interval;
            let wait = next_tick.saturating_duration_since(Instant::now());
            if wait.is_zero() {
                // fell behind; don't try to catch up with a burst of ticks
                next_tick = Instant::now();
            } else {
                std::thread::sleep(wait);
            }
        }

        self.finish(output, start.elapsed().as_secs_f64())
    }

    /// Run the whole session on a simulated clock as fast as possible.
    /// A scripted performer, if any, is polled each tick in place of a device.
    pub fn run_offline(
        &mut self,
        output: &mut dyn AudioOutput,
        mut performer: Option<&mut ScriptedPerformer>,
        duration: Option<f64>,
    ) -> Result<Scoreboard> {
        let tick = 1.0 / self.settings.tick_rate.max(1) as f64;
        log::info!("[MAIN] rendering offline at {} Hz", self.sample_rate);

        self.announce_background();
        let adapter = self.adapter();
        let mut index: u64 = 0;
        let mut now = 0.0;

        loop {
            if let Some(performer) = performer.as_deref_mut() {
                performer.poll(now, &adapter);
            }
            self.step(now, now + tick, output)?;
            if self.is_done(now, duration) {
                break;
            }
            index += 1;
            now = index as f64 * tick;
        }

        self.finish(output, now)
    }

    fn finish(&mut self, output: &mut dyn AudioOutput, now: f64) -> Result<Scoreboard> {
        self.dispatcher.silence(now);
        output.finish().context("closing audio output")?;

        let score = self.dispatcher.judge().scoreboard();
        let synth = self.dispatcher.synth().stats();
        log::info!("[MAIN] session over after {}", format_time(now));
        log::info!("[MAIN] score: {}", score);
        log::info!(
            "[MAIN] events: {} enqueued, {} dropped, {} malformed, {} ignored",
            self.queue_stats.enqueued(),
            self.queue_stats.dropped(),
            self.queue_stats.malformed(),
            self.queue_stats.ignored()
        );
        log::info!(
            "[MAIN] synth: {} triggers, {} retriggers, {} rejected",
            synth.triggers, synth.retriggers, synth.rejected
        );
        Ok(score)
    }
}
