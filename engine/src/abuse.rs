//! Autoclicker detection: a rolling one-second window of tap timestamps per
//! identity. The windows are ephemeral process state; only the ban deadline
//! the caller writes into the player record survives a restart.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use tapcoin_types::{AUTOCLICK_BAN_MS, CLICK_WINDOW_MS, MAX_CLICKS_PER_SECOND};

/// Verdict for one tap attempt.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Admission {
    Admit,
    /// Tap denied. `newly_banned` means this very check imposed the ban and
    /// the caller must persist `ban_end_time`; otherwise an earlier ban is
    /// still running and the record already carries the deadline.
    Deny {
        ban_end_time: u64,
        newly_banned: bool,
    },
}

#[derive(Default)]
pub struct AbuseDetector {
    windows: Mutex<HashMap<String, VecDeque<u64>>>,
}

impl AbuseDetector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Admits or denies one tap at `now_ms`. `ban_end_time` is the deadline
    /// currently on the player record, if any.
    ///
    /// Taps arriving during an active ban are denied without touching the
    /// window, so a banned player hammering the endpoint cannot extend their
    /// own ban. When the window exceeds the threshold it is cleared, giving
    /// the player a clean slate once the ban lapses.
    pub fn check(&self, identity: &str, now_ms: u64, ban_end_time: Option<u64>) -> Admission {
        if let Some(end) = ban_end_time {
            if end > now_ms {
                return Admission::Deny {
                    ban_end_time: end,
                    newly_banned: false,
                };
            }
        }

        let mut windows = self.windows.lock().unwrap_or_else(|err| err.into_inner());
        let window = windows.entry(identity.to_string()).or_default();
        let cutoff = now_ms.saturating_sub(CLICK_WINDOW_MS);
        while window.front().is_some_and(|&stamp| stamp < cutoff) {
            window.pop_front();
        }
        window.push_back(now_ms);
        if window.len() > MAX_CLICKS_PER_SECOND {
            window.clear();
            return Admission::Deny {
                ban_end_time: now_ms + AUTOCLICK_BAN_MS,
                newly_banned: true,
            };
        }
        Admission::Admit
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slow_tapping_is_always_admitted() {
        let detector = AbuseDetector::new();
        for i in 0..200 {
            let now = i * 200; // 5 taps per second
            assert_eq!(detector.check("42", now, None), Admission::Admit);
        }
    }

    #[test]
    fn twenty_first_tap_in_one_second_is_banned() {
        let detector = AbuseDetector::new();
        for i in 0..MAX_CLICKS_PER_SECOND as u64 {
            assert_eq!(detector.check("42", 1_000 + i, None), Admission::Admit);
        }
        assert_eq!(
            detector.check("42", 1_020, None),
            Admission::Deny {
                ban_end_time: 1_020 + AUTOCLICK_BAN_MS,
                newly_banned: true,
            }
        );
    }

    #[test]
    fn taps_during_a_ban_do_not_extend_it() {
        let detector = AbuseDetector::new();
        let ban_end = Some(50_000);
        assert_eq!(
            detector.check("42", 10_000, ban_end),
            Admission::Deny {
                ban_end_time: 50_000,
                newly_banned: false,
            }
        );
        // Even a burst during the ban leaves the deadline untouched and the
        // window empty.
        for i in 0..100 {
            let verdict = detector.check("42", 10_000 + i, ban_end);
            assert_eq!(
                verdict,
                Admission::Deny {
                    ban_end_time: 50_000,
                    newly_banned: false,
                }
            );
        }
        assert_eq!(detector.check("42", 50_000, None), Admission::Admit);
    }

    #[test]
    fn window_is_cleared_when_a_ban_is_imposed() {
        let detector = AbuseDetector::new();
        for i in 0..=MAX_CLICKS_PER_SECOND as u64 {
            detector.check("42", i, None);
        }
        // The burst that tripped the ban is forgotten; after expiry the
        // player starts from an empty window.
        assert_eq!(detector.check("42", AUTOCLICK_BAN_MS + 100, None), Admission::Admit);
    }

    #[test]
    fn old_taps_fall_out_of_the_window() {
        let detector = AbuseDetector::new();
        for i in 0..MAX_CLICKS_PER_SECOND as u64 {
            assert_eq!(detector.check("42", i, None), Admission::Admit);
        }
        // One second later the window has drained; another burst is fine up
        // to the threshold again.
        for i in 0..MAX_CLICKS_PER_SECOND as u64 {
            assert_eq!(detector.check("42", 2_000 + i, None), Admission::Admit);
        }
    }

    #[test]
    fn identities_are_tracked_independently() {
        let detector = AbuseDetector::new();
        for i in 0..=MAX_CLICKS_PER_SECOND as u64 {
            detector.check("42", i, None);
        }
        assert_eq!(detector.check("7", 21, None), Admission::Admit);
    }
}
