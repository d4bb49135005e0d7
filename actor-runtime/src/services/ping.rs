//! Demo service: arms a repeating timer on `start()` and broadcasts a
//! `"ping"` header message on every firing. Exercises the timer and
//! broadcast paths end-to-end; registered under the type name `"ping"`.

use actor_core::buffer::Buffer;
use actor_core::{Envelope, MessageType, Service, ServiceContext, TimerId};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
struct PingConfig {
    #[serde(default = "default_interval_ms")]
    interval_ms: i64,
    /// `<= 0` repeats forever, matching `TimerWheel::repeat`'s convention.
    #[serde(default = "default_times")]
    times: i32,
}

fn default_interval_ms() -> i64 {
    1000
}

fn default_times() -> i32 {
    -1
}

impl Default for PingConfig {
    fn default() -> Self {
        PingConfig {
            interval_ms: default_interval_ms(),
            times: default_times(),
        }
    }
}

#[derive(Default)]
pub struct Ping {
    config: PingConfig,
    timer_id: Option<TimerId>,
}

impl Service for Ping {
    fn init(&mut self, _ctx: &ServiceContext, config: &[u8]) -> bool {
        self.config = if config.is_empty() {
            PingConfig::default()
        } else {
            match serde_json::from_slice(config) {
                Ok(cfg) => cfg,
                Err(_) => return false,
            }
        };
        true
    }

    fn start(&mut self, ctx: &ServiceContext) {
        self.timer_id = Some(ctx.repeat_timer(self.config.interval_ms, self.config.times));
    }

    fn dispatch(&mut self, _ctx: &ServiceContext, _envelope: &Envelope) {}

    fn on_timer(&mut self, ctx: &ServiceContext, timer_id: TimerId, is_last: bool) {
        if self.timer_id != Some(timer_id) {
            return;
        }
        let mut buf = Buffer::with_capacity(4);
        buf.write_back(b"ping");
        ctx.router().broadcast(ctx.id(), buf.into_shared(), "ping", MessageType::SYSTEM);
        if is_last {
            self.timer_id = None;
        }
    }

    fn exit(&mut self, ctx: &ServiceContext) {
        if let Some(id) = self.timer_id.take() {
            ctx.cancel_timer(id);
        }
        ctx.quit();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_repeats_forever_every_second() {
        let cfg = PingConfig::default();
        assert_eq!(cfg.interval_ms, 1000);
        assert_eq!(cfg.times, -1);
    }

    #[test]
    fn config_parses_from_json() {
        let cfg: PingConfig = serde_json::from_slice(br#"{"interval_ms":10,"times":3}"#).unwrap();
        assert_eq!(cfg.interval_ms, 10);
        assert_eq!(cfg.times, 3);
    }
}
