//! King-of-the-Hill seating and the challenger queue
//!
//! Pure bookkeeping: who sits where, who waits, and how the table rotates
//! when a match ends. The engine drives it; nothing here touches the clock
//! or the board.

use hive_core::Color;
use std::collections::VecDeque;

pub type SessionId = u64;

/// Display name the bot seats under.
pub const BOT_NAME: &str = "Hivemind";

#[derive(Clone, Debug)]
pub struct Seat {
    /// `None` marks the bot's seat.
    pub session: Option<SessionId>,
    pub name: String,
    pub wins: u32,
}

impl Seat {
    pub fn human(session: SessionId, name: String) -> Self {
        Self {
            session: Some(session),
            name,
            wins: 0,
        }
    }

    pub fn bot() -> Self {
        Self {
            session: None,
            name: BOT_NAME.to_string(),
            wins: 0,
        }
    }

    pub fn is_bot(&self) -> bool {
        self.session.is_none()
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Challenger {
    pub session: SessionId,
    pub name: String,
}

#[derive(Debug, PartialEq, Eq)]
pub enum JoinOutcome {
    AlreadyPresent,
    /// The bot was shown the door; the human takes its colour.
    ReplacedBot(Color),
    Seated(Color),
    Queued,
}

#[derive(Debug, PartialEq, Eq)]
pub enum Removal {
    Seated(Color),
    Queued,
    NotPresent,
}

#[derive(Debug, PartialEq, Eq)]
pub enum BotMatchRefused {
    QueueNotEmpty,
    OpponentSeated,
}

#[derive(Clone, Debug, Default)]
pub struct Seating {
    pub white: Option<Seat>,
    pub black: Option<Seat>,
    pub queue: VecDeque<Challenger>,
}

impl Seating {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn seat(&self, color: Color) -> Option<&Seat> {
        match color {
            Color::White => self.white.as_ref(),
            Color::Black => self.black.as_ref(),
        }
    }

    pub fn seat_mut(&mut self, color: Color) -> Option<&mut Seat> {
        match color {
            Color::White => self.white.as_mut(),
            Color::Black => self.black.as_mut(),
        }
    }

    pub fn both_seated(&self) -> bool {
        self.white.is_some() && self.black.is_some()
    }

    pub fn color_of(&self, session: SessionId) -> Option<Color> {
        for color in [Color::White, Color::Black] {
            if self.seat(color).and_then(|s| s.session) == Some(session) {
                return Some(color);
            }
        }
        None
    }

    pub fn is_queued(&self, session: SessionId) -> bool {
        self.queue.iter().any(|c| c.session == session)
    }

    pub fn bot_color(&self) -> Option<Color> {
        [Color::White, Color::Black]
            .into_iter()
            .find(|&c| self.seat(c).is_some_and(Seat::is_bot))
    }

    pub fn queue_names(&self) -> Vec<String> {
        self.queue.iter().map(|c| c.name.clone()).collect()
    }

    /// A new human arrives: interrupt a bot match, fill an empty seat
    /// (White first), or join the back of the queue.
    pub fn join_human(&mut self, session: SessionId, name: String) -> JoinOutcome {
        if self.color_of(session).is_some() || self.is_queued(session) {
            return JoinOutcome::AlreadyPresent;
        }
        if let Some(color) = self.bot_color() {
            *self.seat_slot(color) = Some(Seat::human(session, name));
            return JoinOutcome::ReplacedBot(color);
        }
        if self.white.is_none() {
            self.white = Some(Seat::human(session, name));
            return JoinOutcome::Seated(Color::White);
        }
        if self.black.is_none() {
            self.black = Some(Seat::human(session, name));
            return JoinOutcome::Seated(Color::Black);
        }
        self.queue.push_back(Challenger { session, name });
        JoinOutcome::Queued
    }

    /// A bot match may only start when nobody is waiting and no human
    /// opponent already sits opposite. Returns the bot's colour.
    pub fn join_vs_bot(
        &mut self,
        session: SessionId,
        name: String,
        bot_takes: Color,
    ) -> Result<Color, BotMatchRefused> {
        if !self.queue.is_empty() {
            return Err(BotMatchRefused::QueueNotEmpty);
        }
        if let Some(color) = self.color_of(session) {
            // Already seated, waiting for an opponent.
            let opposite = color.opponent();
            if self.seat(opposite).is_some() {
                return Err(BotMatchRefused::OpponentSeated);
            }
            *self.seat_slot(opposite) = Some(Seat::bot());
            return Ok(opposite);
        }
        if self.white.is_some() || self.black.is_some() {
            return Err(BotMatchRefused::OpponentSeated);
        }
        *self.seat_slot(bot_takes) = Some(Seat::bot());
        *self.seat_slot(bot_takes.opponent()) = Some(Seat::human(session, name));
        Ok(bot_takes)
    }

    /// Drop a session from wherever it is.
    pub fn remove_session(&mut self, session: SessionId) -> Removal {
        if let Some(color) = self.color_of(session) {
            *self.seat_slot(color) = None;
            return Removal::Seated(color);
        }
        let before = self.queue.len();
        self.queue.retain(|c| c.session != session);
        if self.queue.len() != before {
            Removal::Queued
        } else {
            Removal::NotPresent
        }
    }

    pub fn clear_seats(&mut self) {
        self.white = None;
        self.black = None;
    }

    /// Post-match rotation. The winner keeps their seat as White; the loser
    /// goes to the back of the queue and the head challenger takes Black.
    /// With nobody waiting, the two rematch. A draw leaves the table as is.
    pub fn rotate(&mut self, winner: Option<Color>) {
        let Some(winner_color) = winner else {
            return;
        };
        let winner_seat = self.seat_slot(winner_color).take();
        let loser_seat = self.seat_slot(winner_color.opponent()).take();

        self.white = winner_seat;
        if let Some(next) = self.queue.pop_front() {
            self.black = Some(Seat::human(next.session, next.name));
            if let Some(loser) = loser_seat {
                if let Some(session) = loser.session {
                    self.queue.push_back(Challenger {
                        session,
                        name: loser.name,
                    });
                }
                // A bot loser simply leaves the table.
            }
        } else {
            self.black = loser_seat;
        }
    }

    fn seat_slot(&mut self, color: Color) -> &mut Option<Seat> {
        match color {
            Color::White => &mut self.white,
            Color::Black => &mut self.black,
        }
    }
}
