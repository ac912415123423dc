//! Reaction-time round: wait a random delay, then time the click.

use rand::Rng;
use std::{
    ops::Range,
    time::{
        Duration,
        Instant,
    },
};

pub const DELAY_RANGE_MS: Range<u64> = 1_500..4_000;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ReflexPhase {
    Idle,
    Waiting { go_at: Instant },
    Go { since: Instant },
    Done { reaction_ms: u64 },
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ClickResult {
    Started,
    TooEarly,
    Measured(u64),
}

#[derive(Clone, Debug)]
pub struct ReflexGame {
    phase: ReflexPhase,
}

impl Default for ReflexGame {
    fn default() -> Self {
        Self::new()
    }
}

impl ReflexGame {
    pub fn new() -> Self {
        Self {
            phase: ReflexPhase::Idle,
        }
    }

    pub fn phase(&self) -> ReflexPhase {
        self.phase
    }

    pub fn click(&mut self, now: Instant) -> ClickResult {
        self.click_with_delay(now, random_delay())
    }

    pub fn click_with_delay(&mut self, now: Instant, delay: Duration) -> ClickResult {
        match self.phase {
            ReflexPhase::Idle | ReflexPhase::Done { .. } => {
                self.phase = ReflexPhase::Waiting { go_at: now + delay };
                ClickResult::Started
            }
            ReflexPhase::Waiting { .. } => {
                self.phase = ReflexPhase::Idle;
                ClickResult::TooEarly
            }
            ReflexPhase::Go { since } => {
                let elapsed = now.saturating_duration_since(since).as_millis();
                let reaction_ms = u64::try_from(elapsed).unwrap_or(u64::MAX);
                self.phase = ReflexPhase::Done { reaction_ms };
                ClickResult::Measured(reaction_ms)
            }
        }
    }

    /// Flips a waiting round to go once its delay has passed. The reaction
    /// clock starts at `now`, when the prompt is first shown.
    pub fn tick(&mut self, now: Instant) -> bool {
        match self.phase {
            ReflexPhase::Waiting { go_at } if now >= go_at => {
                self.phase = ReflexPhase::Go { since: now };
                true
            }
            _ => false,
        }
    }

    pub fn submittable_score(&self) -> Option<u64> {
        match self.phase {
            ReflexPhase::Done { reaction_ms } if reaction_ms > 0 => Some(reaction_ms),
            _ => None,
        }
    }

    pub fn reset(&mut self) {
        self.phase = ReflexPhase::Idle;
    }
}

pub fn random_delay() -> Duration {
    Duration::from_millis(rand::rng().random_range(DELAY_RANGE_MS))
}

#[cfg(test)]
mod tests {
    #![allow(non_snake_case)]
    use super::*;

    const DELAY: Duration = Duration::from_millis(2_000);

    #[test]
    fn click__in_idle_starts_waiting() {
        // given
        let mut game = ReflexGame::new();
        let now = Instant::now();

        // when
        let result = game.click_with_delay(now, DELAY);

        // then
        assert_eq!(result, ClickResult::Started);
        assert_eq!(game.phase(), ReflexPhase::Waiting { go_at: now + DELAY });
    }

    #[test]
    fn click__while_waiting_is_too_early() {
        // given
        let mut game = ReflexGame::new();
        let now = Instant::now();
        game.click_with_delay(now, DELAY);

        // when
        let result = game.click_with_delay(now + Duration::from_millis(500), DELAY);

        // then
        assert_eq!(result, ClickResult::TooEarly);
        assert_eq!(game.phase(), ReflexPhase::Idle);
        assert_eq!(game.submittable_score(), None);
    }

    #[test]
    fn click__after_go_measures_from_when_go_was_shown() {
        // given
        let mut game = ReflexGame::new();
        let start = Instant::now();
        game.click_with_delay(start, DELAY);
        assert!(!game.tick(start + Duration::from_millis(1_999)));
        assert!(game.tick(start + Duration::from_millis(2_050)));

        // when
        let result = game.click_with_delay(start + Duration::from_millis(2_281), DELAY);

        // then
        assert_eq!(result, ClickResult::Measured(231));
        assert_eq!(game.submittable_score(), Some(231));
    }

    #[test]
    fn tick__late_tick_does_not_inflate_reaction_time() {
        // given
        let mut game = ReflexGame::new();
        let start = Instant::now();
        game.click_with_delay(start, DELAY);
        let shown = start + Duration::from_millis(2_400);

        // when
        game.tick(shown);
        let result = game.click_with_delay(shown + Duration::from_millis(10), DELAY);

        // then
        assert_eq!(game.submittable_score(), Some(10));
        assert_eq!(result, ClickResult::Measured(10));
    }

    #[test]
    fn click__when_done_starts_new_round() {
        // given
        let mut game = ReflexGame::new();
        let start = Instant::now();
        game.click_with_delay(start, DELAY);
        game.tick(start + DELAY);
        game.click_with_delay(start + DELAY + Duration::from_millis(300), DELAY);

        // when
        let result = game.click_with_delay(start + Duration::from_secs(10), DELAY);

        // then
        assert_eq!(result, ClickResult::Started);
        assert!(matches!(game.phase(), ReflexPhase::Waiting { .. }));
    }

    #[test]
    fn submittable_score__zero_reaction_is_not_submittable() {
        let mut game = ReflexGame::new();
        let start = Instant::now();
        game.click_with_delay(start, DELAY);
        game.tick(start + DELAY);
        assert_eq!(
            game.click_with_delay(start + DELAY, DELAY),
            ClickResult::Measured(0)
        );
        assert_eq!(game.submittable_score(), None);
    }

    #[test]
    fn random_delay__stays_in_range() {
        for _ in 0..100 {
            let ms = random_delay().as_millis() as u64;
            assert!(DELAY_RANGE_MS.contains(&ms));
        }
    }
}
