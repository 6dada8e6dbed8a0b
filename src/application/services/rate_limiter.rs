//! Sliding-window flood protection with warn-then-ignore escalation

use std::collections::HashMap;
use std::str::FromStr;
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};

use crate::domain::entities::nick_of;

/// Runtime-adjustable limits
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitSettings {
    pub message_window: Duration,
    pub max_messages: usize,
    pub command_window: Duration,
    pub max_commands: usize,
    pub warning_threshold: u32,
    /// Quiet period after the last warning before warnings are forgotten
    pub warning_decay: Duration,
}

impl Default for RateLimitSettings {
    fn default() -> Self {
        Self {
            message_window: Duration::from_secs(10),
            max_messages: 5,
            command_window: Duration::from_secs(30),
            max_commands: 10,
            warning_threshold: 3,
            warning_decay: Duration::from_secs(3600),
        }
    }
}

/// Settings addressable by `ratelimit set`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateLimitParam {
    MessageWindow,
    MaxMessages,
    CommandWindow,
    MaxCommands,
    WarningThreshold,
    WarningDecay,
}

impl FromStr for RateLimitParam {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "msg-window" => Ok(RateLimitParam::MessageWindow),
            "msg-max" => Ok(RateLimitParam::MaxMessages),
            "cmd-window" => Ok(RateLimitParam::CommandWindow),
            "cmd-max" => Ok(RateLimitParam::MaxCommands),
            "warning" => Ok(RateLimitParam::WarningThreshold),
            "warning-decay" => Ok(RateLimitParam::WarningDecay),
            other => Err(format!("Unknown parameter: {}", other)),
        }
    }
}

/// What the caller should do after tracking an event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Allowed,
    /// Over the limit, below the threshold. The event is still processed.
    Warned { warnings: u32, threshold: u32, count: usize },
    /// Threshold reached; the sender must be demoted to Ignored.
    Demote { count: usize },
}

/// Which window a chat line broke
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flood {
    Messages,
    Commands,
}

impl Flood {
    pub fn as_str(&self) -> &'static str {
        match self {
            Flood::Messages => "messages",
            Flood::Commands => "commands",
        }
    }
}

#[derive(Debug, Default)]
struct RateRecord {
    messages: Vec<Instant>,
    commands: HashMap<String, Vec<Instant>>,
    warnings: u32,
    last_warning: Option<Instant>,
}

impl RateRecord {
    fn is_quiet(&self) -> bool {
        self.messages.is_empty() && self.commands.is_empty()
    }

    fn is_idle(&self) -> bool {
        self.warnings == 0 && self.is_quiet()
    }
}

#[derive(Debug, Default)]
struct LimiterState {
    settings: RateLimitSettings,
    records: HashMap<String, RateRecord>,
}

/// Per-identity message and command counters
#[derive(Debug, Default)]
pub struct RateLimiter {
    state: Mutex<LimiterState>,
}

fn prune(times: &mut Vec<Instant>, now: Instant, window: Duration) {
    times.retain(|&t| now.saturating_duration_since(t) < window);
}

impl RateLimiter {
    pub fn new(settings: RateLimitSettings) -> Self {
        Self {
            state: Mutex::new(LimiterState {
                settings,
                records: HashMap::new(),
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, LimiterState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn settings(&self) -> RateLimitSettings {
        self.lock().settings
    }

    /// Apply a new value; takes effect on the next tracked event.
    pub fn update(&self, param: RateLimitParam, value: u64) -> Result<(), String> {
        if value < 1 {
            return Err(match param {
                RateLimitParam::MessageWindow | RateLimitParam::CommandWindow | RateLimitParam::WarningDecay => {
                    "Value must be at least 1 second".to_string()
                }
                _ => "Value must be at least 1".to_string(),
            });
        }
        let mut state = self.lock();
        let settings = &mut state.settings;
        match param {
            RateLimitParam::MessageWindow => settings.message_window = Duration::from_secs(value),
            RateLimitParam::MaxMessages => settings.max_messages = value as usize,
            RateLimitParam::CommandWindow => settings.command_window = Duration::from_secs(value),
            RateLimitParam::MaxCommands => settings.max_commands = value as usize,
            RateLimitParam::WarningThreshold => {
                settings.warning_threshold = u32::try_from(value).unwrap_or(u32::MAX)
            }
            RateLimitParam::WarningDecay => settings.warning_decay = Duration::from_secs(value),
        }
        tracing::info!(?param, value, "Rate limit setting changed");
        Ok(())
    }

    pub fn track_message(&self, id: &str) -> (bool, usize) {
        self.track_message_at(id, Instant::now())
    }

    /// Record a chat line at `now`. Returns whether the window limit is exceeded and the count.
    pub fn track_message_at(&self, id: &str, now: Instant) -> (bool, usize) {
        let mut state = self.lock();
        let window = state.settings.message_window;
        let max = state.settings.max_messages;
        let record = state.records.entry(id.to_string()).or_default();
        record.messages.push(now);
        prune(&mut record.messages, now, window);
        let count = record.messages.len();
        (count > max, count)
    }

    pub fn track_command(&self, id: &str, command: &str) -> (bool, usize) {
        self.track_command_at(id, command, Instant::now())
    }

    pub fn track_command_at(&self, id: &str, command: &str, now: Instant) -> (bool, usize) {
        let mut state = self.lock();
        let window = state.settings.command_window;
        let max = state.settings.max_commands;
        let record = state.records.entry(id.to_string()).or_default();
        let times = record.commands.entry(command.to_string()).or_default();
        times.push(now);
        prune(times, now, window);
        let count = times.len();
        (count > max, count)
    }

    pub fn add_warning(&self, id: &str) -> bool {
        self.add_warning_at(id, Instant::now())
    }

    /// Count a violation. Returns true once the warning threshold is reached.
    pub fn add_warning_at(&self, id: &str, now: Instant) -> bool {
        let mut state = self.lock();
        let threshold = state.settings.warning_threshold;
        let record = state.records.entry(id.to_string()).or_default();
        record.warnings = record.warnings.saturating_add(1);
        record.last_warning = Some(now);
        record.warnings >= threshold
    }

    pub fn warning_count(&self, id: &str) -> u32 {
        self.lock().records.get(id).map(|r| r.warnings).unwrap_or(0)
    }

    /// Track a chat line and escalate when it breaks the window limit.
    pub fn check_message_at(&self, id: &str, now: Instant) -> Verdict {
        let (exceeded, count) = self.track_message_at(id, now);
        self.escalate(id, exceeded, count, now)
    }

    pub fn check_message(&self, id: &str) -> Verdict {
        self.check_message_at(id, Instant::now())
    }

    /// Track a command line against both windows. A line that breaks both
    /// still counts as a single warning, reported against the command window.
    pub fn check_command_line_at(&self, id: &str, command: &str, now: Instant) -> (Verdict, Flood) {
        let (messages_exceeded, message_count) = self.track_message_at(id, now);
        let (commands_exceeded, command_count) = self.track_command_at(id, command, now);
        let (flood, exceeded, count) = if commands_exceeded {
            (Flood::Commands, true, command_count)
        } else {
            (Flood::Messages, messages_exceeded, message_count)
        };
        (self.escalate(id, exceeded, count, now), flood)
    }

    pub fn check_command_line(&self, id: &str, command: &str) -> (Verdict, Flood) {
        self.check_command_line_at(id, command, Instant::now())
    }

    fn escalate(&self, id: &str, exceeded: bool, count: usize, now: Instant) -> Verdict {
        if !exceeded {
            return Verdict::Allowed;
        }
        if self.add_warning_at(id, now) {
            return Verdict::Demote { count };
        }
        Verdict::Warned {
            warnings: self.warning_count(id),
            threshold: self.settings().warning_threshold,
            count,
        }
    }

    /// Forget all tracking for one identity
    pub fn reset_user(&self, id: &str) -> bool {
        self.lock().records.remove(id).is_some()
    }

    /// Forget tracking for every identity using `nick`. Returns how many were reset.
    pub fn reset_nick(&self, nick: &str) -> usize {
        let mut state = self.lock();
        let before = state.records.len();
        state
            .records
            .retain(|id, _| !nick_of(id).eq_ignore_ascii_case(nick));
        before - state.records.len()
    }

    /// Drop expired timestamps, forget warnings after a quiet period, then
    /// drop records with nothing left to remember
    pub fn purge_idle_at(&self, now: Instant) -> usize {
        let mut state = self.lock();
        let settings = state.settings;
        let before = state.records.len();
        state.records.retain(|_, record| {
            prune(&mut record.messages, now, settings.message_window);
            record.commands.retain(|_, times| {
                prune(times, now, settings.command_window);
                !times.is_empty()
            });
            let decayed = record
                .last_warning
                .map_or(true, |at| now.saturating_duration_since(at) >= settings.warning_decay);
            if record.is_quiet() && decayed {
                record.warnings = 0;
                record.last_warning = None;
            }
            !record.is_idle()
        });
        before - state.records.len()
    }

    pub fn tracked(&self) -> usize {
        self.lock().records.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ID: &str = "spam!s@host";

    #[test]
    fn exceeds_only_after_max_in_window() {
        let limiter = RateLimiter::new(RateLimitSettings::default());
        let start = Instant::now();
        for i in 0..5 {
            let (exceeded, count) = limiter.track_message_at(ID, start + Duration::from_millis(i * 100));
            assert!(!exceeded);
            assert_eq!(count, i as usize + 1);
        }
        let (exceeded, count) = limiter.track_message_at(ID, start + Duration::from_millis(600));
        assert!(exceeded);
        assert_eq!(count, 6);
    }

    #[test]
    fn spaced_events_never_exceed() {
        let limiter = RateLimiter::new(RateLimitSettings::default());
        let start = Instant::now();
        for i in 0..50 {
            let (exceeded, count) = limiter.track_message_at(ID, start + Duration::from_secs(i * 10));
            assert!(!exceeded);
            assert_eq!(count, 1);
        }
    }

    #[test]
    fn commands_are_counted_per_name() {
        let limiter = RateLimiter::new(RateLimitSettings {
            max_commands: 2,
            ..Default::default()
        });
        let now = Instant::now();
        limiter.track_command_at(ID, "help", now);
        limiter.track_command_at(ID, "help", now);
        assert!(!limiter.track_command_at(ID, "say", now).0);
        assert!(limiter.track_command_at(ID, "help", now).0);
    }

    #[test]
    fn warnings_escalate_to_demotion() {
        let limiter = RateLimiter::new(RateLimitSettings {
            max_messages: 1,
            warning_threshold: 2,
            ..Default::default()
        });
        let now = Instant::now();
        assert_eq!(limiter.check_message_at(ID, now), Verdict::Allowed);
        assert_eq!(
            limiter.check_message_at(ID, now),
            Verdict::Warned { warnings: 1, threshold: 2, count: 2 }
        );
        assert_eq!(limiter.check_message_at(ID, now), Verdict::Demote { count: 3 });
        assert_eq!(limiter.check_message_at("calm!c@host", now), Verdict::Allowed);
    }

    #[test]
    fn settings_apply_immediately() {
        let limiter = RateLimiter::new(RateLimitSettings::default());
        let now = Instant::now();
        limiter.track_message_at(ID, now);
        limiter.update(RateLimitParam::MaxMessages, 1).unwrap();
        assert!(limiter.track_message_at(ID, now).0);
        assert!(limiter.update(RateLimitParam::MessageWindow, 0).is_err());
        assert_eq!("cmd-max".parse::<RateLimitParam>(), Ok(RateLimitParam::MaxCommands));
        assert!("burst".parse::<RateLimitParam>().is_err());
    }

    #[test]
    fn reset_by_nick_covers_every_host() {
        let limiter = RateLimiter::default();
        limiter.track_message("spam!a@one");
        limiter.track_message("Spam!b@two");
        limiter.track_message("other!o@one");
        assert_eq!(limiter.reset_nick("spam"), 2);
        assert_eq!(limiter.tracked(), 1);
        assert!(limiter.reset_user("other!o@one"));
        assert!(!limiter.reset_user("other!o@one"));
    }

    #[test]
    fn purge_keeps_warned_identities() {
        let limiter = RateLimiter::default();
        let start = Instant::now();
        limiter.track_message_at("quiet!q@h", start);
        limiter.add_warning(ID);
        let removed = limiter.purge_idle_at(start + Duration::from_secs(60));
        assert_eq!(removed, 1);
        assert_eq!(limiter.warning_count(ID), 1);
    }

    #[test]
    fn warnings_decay_after_quiet_period() {
        let limiter = RateLimiter::new(RateLimitSettings {
            warning_decay: Duration::from_secs(600),
            ..Default::default()
        });
        let start = Instant::now();
        limiter.add_warning_at(ID, start);
        limiter.add_warning_at("busy!b@h", start);

        assert_eq!(limiter.purge_idle_at(start + Duration::from_secs(599)), 0);
        assert_eq!(limiter.warning_count(ID), 1);

        // Still chatting inside the window keeps the warning alive
        limiter.track_message_at("busy!b@h", start + Duration::from_secs(595));
        assert_eq!(limiter.purge_idle_at(start + Duration::from_secs(600)), 1);
        assert_eq!(limiter.warning_count(ID), 0);
        assert_eq!(limiter.warning_count("busy!b@h"), 1);
        assert_eq!(limiter.tracked(), 1);
    }

    #[test]
    fn command_line_escalates_once() {
        let limiter = RateLimiter::new(RateLimitSettings {
            max_messages: 1,
            max_commands: 1,
            warning_threshold: 3,
            ..Default::default()
        });
        let now = Instant::now();
        assert_eq!(limiter.check_command_line_at(ID, "say", now), (Verdict::Allowed, Flood::Messages));
        // Both windows broken by one line, one warning
        assert_eq!(
            limiter.check_command_line_at(ID, "say", now),
            (Verdict::Warned { warnings: 1, threshold: 3, count: 2 }, Flood::Commands)
        );
        assert_eq!(
            limiter.check_command_line_at(ID, "help", now),
            (Verdict::Warned { warnings: 2, threshold: 3, count: 3 }, Flood::Messages)
        );
        assert_eq!(limiter.warning_count(ID), 2);
    }
}
