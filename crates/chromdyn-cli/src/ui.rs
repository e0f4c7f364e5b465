use chromdyn::engine::progress::{Progress, ProgressCallback};
use indicatif::{MultiProgress, ProgressBar, ProgressDrawTarget, ProgressState, ProgressStyle};
use std::io::{self, Write};
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, watch};
use tracing::warn;

const EVENT_BUFFER: usize = 1024;
const REDRAW_HZ: u8 = 12;
const SPINNER_TICK: Duration = Duration::from_millis(80);

#[derive(Debug)]
pub enum UiEvent {
    Progress(Progress),
    Log(String),
}

/// Renders library progress (simulation blocks, sampled frames) and routed log lines.
pub struct UiManager {
    mp: MultiProgress,
    state: BarState,
    events: mpsc::Receiver<UiEvent>,
    shutdown: watch::Receiver<bool>,
    // Keeps the multi-progress target alive between phases.
    anchor: ProgressBar,
}

/// The phase currently on screen; at most one bar is shown at a time.
#[derive(Default)]
struct BarState {
    active_bar: Option<ProgressBar>,
    base_message: String,
    phase_started: Option<Instant>,
}

impl BarState {
    fn clear(&mut self) {
        if let Some(bar) = self.active_bar.take() {
            bar.finish_and_clear();
        }
    }

    fn begin(&mut self, mp: &MultiProgress, name: &str) {
        self.clear();
        let bar = mp.add(ProgressBar::new_spinner());
        bar.set_style(spinner_style());
        bar.set_message(name.to_string());
        bar.enable_steady_tick(SPINNER_TICK);
        self.active_bar = Some(bar);
        self.base_message = name.to_string();
        self.phase_started = Some(Instant::now());
    }

    /// Clears the bar and returns the line summarising the finished phase.
    fn end(&mut self) -> String {
        self.clear();
        let name = std::mem::take(&mut self.base_message);
        match self.phase_started.take() {
            Some(start) => format!("✓ {} ({:.1}s)", name, start.elapsed().as_secs_f64()),
            None => format!("✓ {}", name),
        }
    }

    fn with_bar(&self, f: impl FnOnce(&ProgressBar)) {
        if let Some(bar) = &self.active_bar {
            f(bar);
        }
    }
}

impl UiManager {
    pub fn new() -> (Self, mpsc::Sender<UiEvent>, watch::Sender<bool>) {
        let (event_tx, events) = mpsc::channel(EVENT_BUFFER);
        let (shutdown_tx, shutdown) = watch::channel(false);
        let mp = MultiProgress::with_draw_target(ProgressDrawTarget::stderr_with_hz(REDRAW_HZ));
        let anchor = mp.add(ProgressBar::hidden());
        let manager = Self {
            mp,
            state: BarState::default(),
            events,
            shutdown,
            anchor,
        };
        (manager, event_tx, shutdown_tx)
    }

    pub async fn run(mut self) {
        loop {
            tokio::select! {
                Some(event) = self.events.recv() => self.handle_event(event),
                changed = self.shutdown.changed() => {
                    if changed.is_err() || *self.shutdown.borrow() {
                        break;
                    }
                }
            }
        }
        // Events sent just before shutdown still get printed.
        while let Ok(event) = self.events.try_recv() {
            self.handle_event(event);
        }
        self.state.clear();
        self.anchor.finish_and_clear();
    }

    fn print(&self, line: impl AsRef<str>) {
        self.mp.println(line).ok();
    }

    fn handle_event(&mut self, event: UiEvent) {
        match event {
            UiEvent::Log(record) => self.print(record.trim_end()),
            UiEvent::Progress(progress) => self.handle_progress(progress),
        }
    }

    fn handle_progress(&mut self, progress: Progress) {
        match progress {
            Progress::PhaseStart { name } => self.state.begin(&self.mp, name),
            Progress::PhaseFinish => {
                let summary = self.state.end();
                self.print(summary);
            }
            Progress::TaskStart { total } => self.state.with_bar(|bar| {
                bar.disable_steady_tick();
                bar.set_style(bar_style());
                bar.set_length(total);
                bar.set_position(0);
            }),
            Progress::TaskIncrement { amount } => self.state.with_bar(|bar| bar.inc(amount)),
            Progress::TaskFinish => self.state.with_bar(ProgressBar::finish),
            Progress::StatusUpdate { text } => {
                let message = format!("{} ({})", self.state.base_message, text);
                self.state.with_bar(|bar| bar.set_message(message));
            }
            Progress::Message(msg) => self.print(format!("  {}", msg)),
        }
    }
}

fn spinner_style() -> ProgressStyle {
    ProgressStyle::with_template("{spinner:.green} {msg} [{elapsed}]")
        .unwrap_or_else(|_| ProgressStyle::default_spinner())
        .tick_strings(&["◐", "◓", "◑", "◒", "●"])
}

/// Counts blocks or frames with their throughput and remaining time.
fn bar_style() -> ProgressStyle {
    ProgressStyle::with_template(
        "{msg:<36} {bar:32.green/white} {pos:>7}/{len:7} {per_sec:>10} eta {eta_s}",
    )
    .unwrap_or_else(|_| ProgressStyle::default_bar())
    .with_key("eta_s", |state: &ProgressState, w: &mut dyn std::fmt::Write| {
        let _ = write!(w, "{:.0}s", state.eta().as_secs_f64());
    })
    .progress_chars("█▓░")
}

#[derive(Clone)]
pub struct CliProgressHandler {
    sender: mpsc::Sender<UiEvent>,
}

impl CliProgressHandler {
    pub fn new(sender: mpsc::Sender<UiEvent>) -> Self {
        Self { sender }
    }

    pub fn get_callback(&self) -> ProgressCallback<'static> {
        let sender = self.sender.clone();
        Box::new(move |progress: Progress| {
            if let Err(e) = sender.try_send(UiEvent::Progress(progress)) {
                warn!("Failed to send progress update to UI channel: {}", e);
            }
        })
    }
}

/// Buffers one formatted log record and hands it to the UI when dropped,
/// so log lines are printed above the progress bars instead of through them.
pub struct UiLogWriter {
    sender: mpsc::Sender<UiEvent>,
    buffer: Vec<u8>,
}

impl UiLogWriter {
    pub fn new(sender: mpsc::Sender<UiEvent>) -> Self {
        Self {
            sender,
            buffer: Vec::new(),
        }
    }
}

impl Write for UiLogWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.buffer.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Drop for UiLogWriter {
    fn drop(&mut self) {
        if self.buffer.is_empty() {
            return;
        }
        let line = String::from_utf8_lossy(&self.buffer).into_owned();
        if let Err(e) = self.sender.try_send(UiEvent::Log(line)) {
            if let UiEvent::Log(line) = e.into_inner() {
                eprint!("{}", line);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chromdyn::engine::progress::Progress;
    use tokio::sync::mpsc;

    fn setup_manager() -> (UiManager, mpsc::Sender<UiEvent>) {
        let (manager, sender, _shutdown) = UiManager::new();
        manager.mp.set_draw_target(ProgressDrawTarget::hidden());
        (manager, sender)
    }

    fn start_phase(manager: &mut UiManager, name: &'static str) {
        manager.handle_event(UiEvent::Progress(Progress::PhaseStart { name }));
    }

    #[test]
    fn phase_start_shows_a_spinner_named_after_the_phase() {
        let (mut manager, _) = setup_manager();
        assert!(manager.state.active_bar.is_none());

        start_phase(&mut manager, "Setup");

        let bar = manager.state.active_bar.as_ref().unwrap();
        assert_eq!(bar.message(), "Setup");
        assert_eq!(manager.state.base_message, "Setup");
    }

    #[test]
    fn a_new_phase_replaces_the_previous_bar() {
        let (mut manager, _) = setup_manager();
        start_phase(&mut manager, "Setup");
        start_phase(&mut manager, "Dynamics");

        let bar = manager.state.active_bar.as_ref().unwrap();
        assert_eq!(bar.message(), "Dynamics");
        assert_eq!(manager.state.base_message, "Dynamics");
    }

    #[test]
    fn phase_finish_clears_the_bar_and_timer() {
        let (mut manager, _) = setup_manager();
        start_phase(&mut manager, "Output");

        manager.handle_event(UiEvent::Progress(Progress::PhaseFinish));

        assert!(manager.state.active_bar.is_none());
        assert!(manager.state.base_message.is_empty());
        assert!(manager.state.phase_started.is_none());
    }

    #[test]
    fn finished_phase_summary_reports_elapsed_time() {
        let (mut manager, _) = setup_manager();
        manager.state.begin(&manager.mp, "Sampling");
        let summary = manager.state.end();
        assert!(summary.starts_with("✓ Sampling ("));
        assert!(summary.ends_with("s)"));
        assert_eq!(manager.state.end(), "✓ ");
    }

    #[test]
    fn task_events_drive_the_bar() {
        let (mut manager, _) = setup_manager();
        start_phase(&mut manager, "Dynamics");

        manager.handle_event(UiEvent::Progress(Progress::TaskStart { total: 1000 }));
        manager.handle_event(UiEvent::Progress(Progress::TaskIncrement { amount: 100 }));
        {
            let bar = manager.state.active_bar.as_ref().unwrap();
            assert_eq!(bar.length(), Some(1000));
            assert_eq!(bar.position(), 100);
        }

        manager.handle_event(UiEvent::Progress(Progress::TaskFinish));
        assert!(manager.state.active_bar.as_ref().unwrap().is_finished());
    }

    #[test]
    fn status_updates_append_to_the_phase_name() {
        let (mut manager, _) = setup_manager();
        start_phase(&mut manager, "Dynamics");

        manager.handle_event(UiEvent::Progress(Progress::StatusUpdate {
            text: "step 500, Ep 2.31".into(),
        }));

        let bar = manager.state.active_bar.as_ref().unwrap();
        assert_eq!(bar.message(), "Dynamics (step 500, Ep 2.31)");
    }

    #[test]
    fn log_and_message_events_print_without_a_bar() {
        let (mut manager, _) = setup_manager();
        manager.handle_event(UiEvent::Log("INFO loaded trajectory\n".to_string()));
        manager.handle_event(UiEvent::Progress(Progress::Message(
            "wrote test_500.pdb".to_string(),
        )));
        assert!(manager.state.active_bar.is_none());
    }

    #[tokio::test]
    async fn progress_callback_forwards_events_to_the_ui() {
        let (sender, mut receiver) = mpsc::channel(1);
        let handler = CliProgressHandler::new(sender);
        let callback = handler.get_callback();

        callback(Progress::PhaseStart { name: "Sampling" });

        match receiver.recv().await.unwrap() {
            UiEvent::Progress(Progress::PhaseStart { name }) => assert_eq!(name, "Sampling"),
            other => panic!("Unexpected event: {:?}", other),
        }
    }

    #[tokio::test]
    async fn log_writer_sends_one_event_per_record() {
        let (sender, mut receiver) = mpsc::channel(4);
        {
            let mut writer = UiLogWriter::new(sender.clone());
            write!(writer, "WARN ").unwrap();
            writeln!(writer, "frame skipped").unwrap();
        }
        drop(UiLogWriter::new(sender));

        match receiver.recv().await.unwrap() {
            UiEvent::Log(line) => assert_eq!(line, "WARN frame skipped\n"),
            other => panic!("Unexpected event: {:?}", other),
        }
        assert!(receiver.try_recv().is_err());
    }
}
