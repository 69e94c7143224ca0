//! Periodic status summary
//!
//! Headless replacement for an interactive console: one `info!` line per
//! interval with connectivity, remote health and dispatch statistics.

use stageled_core::{format_uptime, StageContext, StageState};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::info;

const SLICE: Duration = Duration::from_millis(100);

/// One-line summary of the shared state at `now`
pub fn summary(state: &StageState, now: Instant) -> String {
    let local = &state.local;
    let remote = &state.remote;

    let preset = state
        .preset
        .as_ref()
        .map(|s| s.name.as_str())
        .unwrap_or("-");
    let mask = state
        .mask_selection
        .as_ref()
        .map(|s| s.name.as_str())
        .unwrap_or("-");
    let watts: f32 = remote.psus().iter().map(|psu| psu.watts()).sum();
    let temps = remote
        .temperatures()
        .map(|t| format!("{:.1}", t))
        .join("/");

    format!(
        "surface: {} | remote: {} {} fps, up {} | shown {} / committed {} / dropped {} ({:.2}%) | transform {} us | preset {} | mask {} | {:.1} V, {:.0} W, {} C",
        state.interface,
        local.health(remote, now),
        remote.fps(),
        format_uptime(local.session_uptime_ms(remote)),
        local.shown,
        local.frames,
        local.dropped,
        local.drop_rate,
        local.transform_time.as_micros(),
        preset,
        mask,
        remote.main_voltage(),
        watts,
        temps,
    )
}

/// Log a summary every `interval` until shutdown
pub fn run(ctx: &StageContext, interval: Duration) {
    let mut next = Instant::now() + interval;

    while ctx.is_running() {
        let now = Instant::now();
        if now < next {
            thread::sleep(SLICE.min(next - now));
            continue;
        }

        let line = summary(&ctx.lock(), now);
        info!("{}", line);
        next += interval;
    }
}

/// Start the reporter thread; `None` when the interval is zero
pub fn spawn(
    ctx: Arc<StageContext>,
    interval_secs: u64,
) -> std::io::Result<Option<JoinHandle<()>>> {
    if interval_secs == 0 {
        return Ok(None);
    }

    let interval = Duration::from_secs(interval_secs);
    thread::Builder::new()
        .name("status".to_string())
        .spawn(move || run(&ctx, interval))
        .map(Some)
}

#[cfg(test)]
mod tests {
    use super::*;
    use stageled_core::{InterfaceState, LedLayout, Selection};

    #[test]
    fn test_summary_before_telemetry() {
        let ctx = StageContext::new(LedLayout::new(1, 4));
        let line = summary(&ctx.lock(), Instant::now());

        assert!(line.starts_with("surface: offline | remote: waiting"));
        assert!(line.contains("preset - | mask -"));
        assert!(line.contains("up 00 hrs, 00 min, 00 sec"));
    }

    #[test]
    fn test_summary_reports_selection_and_counters() {
        let ctx = StageContext::new(LedLayout::new(1, 4));
        let now = Instant::now();
        {
            let mut state = ctx.lock();
            state.interface = InterfaceState::Connected;
            state.preset = Some(Selection {
                slot: 2,
                name: "fire.png".to_string(),
            });
            state.remote.record.state = 1;
            state.remote.record.main_ac_voltage = 23_012;
            state.remote.record.main_core_temperature = 4_150;
            state.remote.record.psu0_volt = 1_200;
            state.remote.record.psu0_amps = 1_000;
            state.local.last_feedback = Some(now);
            state.local.frames = 60;
            state.local.shown = 50;
            state.local.dropped = 10;
            state.local.drop_rate = 100.0 / 6.0;
        }

        let line = summary(&ctx.lock(), now);
        assert!(line.starts_with("surface: online | remote: online"));
        assert!(line.contains("shown 50 / committed 60 / dropped 10 (16.67%)"));
        assert!(line.contains("preset fire.png"));
        assert!(line.ends_with("230.1 V, 120 W, 41.5/0.0/0.0/0.0 C"));
    }

    #[test]
    fn test_zero_interval_disables_reporter() {
        let ctx = Arc::new(StageContext::new(LedLayout::new(1, 4)));
        assert!(spawn(ctx, 0).unwrap().is_none());
    }
}
