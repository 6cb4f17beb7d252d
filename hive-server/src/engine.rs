//! The serialised match engine
//!
//! One tokio task owns everything: board, hands, seats, queue, clock, log.
//! Sessions, the 1 Hz clock, bot wake-ups, and the post-match rotation pause
//! all feed the same event queue, so no commit can ever be observed half
//! done. The broadcast of a commit goes out before the next event is drained.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender};

use hive_core::{Action, BotPlayer, Color, GameState, Hex, Winner, DEFAULT_DEPTH, SPECIES};

use crate::protocol::{
    self, ClientMessage, SeatView, SeatsView, ServerMessage, Snapshot, WireAction,
};
use crate::seating::{BotMatchRefused, JoinOutcome, Removal, Seat, Seating, SessionId, BOT_NAME};

/// Per-turn move clock.
pub const TURN_BUDGET: Duration = Duration::from_secs(30);
/// Breather between a decided match and the next one.
pub const ROTATION_PAUSE: Duration = Duration::from_secs(5);

const BOT_DELAY_MIN_MS: u64 = 1500;
const BOT_DELAY_MAX_MS: u64 = 3500;
const BOT_THINK_WARNING: Duration = Duration::from_secs(5);

/// Everything that can reach the engine.
#[derive(Debug)]
pub enum Event {
    Connected {
        session: SessionId,
        tx: UnboundedSender<String>,
    },
    Message {
        session: SessionId,
        message: ClientMessage,
    },
    Disconnected {
        session: SessionId,
    },
    /// A scheduled bot wake-up. Stale epochs are ignored, which is what
    /// makes cancellation idempotent.
    BotTurn {
        epoch: u64,
    },
    /// Fires once the rotation pause has elapsed.
    NextMatch {
        epoch: u64,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Phase {
    Waiting,
    Active,
    Rotation,
}

pub struct Engine {
    state: GameState,
    seating: Seating,
    phase: Phase,
    log: Vec<String>,
    peers: HashMap<SessionId, UnboundedSender<String>>,
    turn_started: Instant,
    /// Bumped whenever outstanding timers must die: terminal, seat change,
    /// match reset.
    epoch: u64,
    events: UnboundedSender<Event>,
    bot: BotPlayer,
    rng: ChaCha8Rng,
}

impl Engine {
    pub fn new(events: UnboundedSender<Event>) -> Self {
        Self::with_rng(events, ChaCha8Rng::from_entropy())
    }

    pub fn with_seed(events: UnboundedSender<Event>, seed: u64) -> Self {
        Self::with_rng(events, ChaCha8Rng::seed_from_u64(seed))
    }

    fn with_rng(events: UnboundedSender<Event>, rng: ChaCha8Rng) -> Self {
        Self {
            state: GameState::new(),
            seating: Seating::new(),
            phase: Phase::Waiting,
            log: Vec::new(),
            peers: HashMap::new(),
            turn_started: Instant::now(),
            epoch: 0,
            events,
            bot: BotPlayer::new(DEFAULT_DEPTH),
            rng,
        }
    }

    /// Drain events and clock ticks forever. Consumes the engine: this task
    /// is the single owner of all match state.
    pub async fn run(mut self, mut events: UnboundedReceiver<Event>) {
        let mut clock = tokio::time::interval(Duration::from_secs(1));
        loop {
            tokio::select! {
                event = events.recv() => match event {
                    Some(event) => self.handle_event(event),
                    None => break,
                },
                _ = clock.tick() => self.handle_clock(),
            }
        }
        tracing::info!("engine loop stopped");
    }

    fn handle_event(&mut self, event: Event) {
        match event {
            Event::Connected { session, tx } => {
                self.peers.insert(session, tx);
                // Reconnect/resume: the latest snapshot is all a client needs.
                self.send_snapshot_to(session);
            }
            Event::Disconnected { session } => self.on_disconnect(session),
            Event::Message { session, message } => match message {
                ClientMessage::JoinAsHuman { name } => self.on_join_human(session, name),
                ClientMessage::JoinVsBot { name } => self.on_join_bot(session, name),
                ClientMessage::GameAction { action } => self.on_action(session, action),
                ClientMessage::Forfeit => self.on_forfeit(session),
            },
            Event::BotTurn { epoch } => self.on_bot_turn(epoch),
            Event::NextMatch { epoch } => self.on_next_match(epoch),
        }
    }

    // ------------------------------------------------------------------
    // Joining and leaving
    // ------------------------------------------------------------------

    fn on_join_human(&mut self, session: SessionId, name: String) {
        if let Err(reason) = self.check_nickname(&name) {
            self.send_error(session, reason);
            return;
        }
        match self.seating.join_human(session, name.clone()) {
            JoinOutcome::AlreadyPresent => self.send_error(session, "already joined"),
            JoinOutcome::ReplacedBot(color) => {
                self.log
                    .push(format!("{name} takes over the {color} seat from the bot"));
                self.start_match(false);
            }
            JoinOutcome::Seated(color) => {
                self.log.push(format!("{name} sits down as {color}"));
                if self.seating.both_seated() {
                    self.start_match(false);
                } else {
                    self.broadcast();
                }
            }
            JoinOutcome::Queued => {
                self.log.push(format!("{name} joins the queue"));
                self.broadcast();
            }
        }
    }

    fn on_join_bot(&mut self, session: SessionId, name: String) {
        if self.seating.is_queued(session) {
            self.send_error(session, "already waiting in the queue");
            return;
        }
        if self.seating.color_of(session).is_none() {
            if let Err(reason) = self.check_nickname(&name) {
                self.send_error(session, reason);
                return;
            }
        }
        let bot_takes = if self.rng.gen::<bool>() {
            Color::White
        } else {
            Color::Black
        };
        match self.seating.join_vs_bot(session, name.clone(), bot_takes) {
            Ok(bot_color) => {
                self.log
                    .push(format!("{name} starts a match against {BOT_NAME}"));
                // A White bot opens at once instead of after the usual delay.
                self.start_match(bot_color == Color::White);
            }
            Err(refused) => {
                let reason = match refused {
                    BotMatchRefused::QueueNotEmpty => {
                        "challengers are waiting; join the queue instead"
                    }
                    BotMatchRefused::OpponentSeated => "a human opponent is already seated",
                };
                self.send_error(session, reason);
            }
        }
    }

    /// Ingress has already sanitised the name; this only rules out blanks,
    /// absurd lengths, and collisions with somebody at the table.
    fn check_nickname(&self, name: &str) -> Result<(), &'static str> {
        let trimmed = name.trim();
        if trimmed.is_empty() || trimmed.len() > 24 {
            return Err("nickname invalid");
        }
        let taken = [Color::White, Color::Black]
            .into_iter()
            .any(|c| self.seating.seat(c).is_some_and(|s| s.name == name))
            || self.seating.queue.iter().any(|c| c.name == name);
        if taken {
            return Err("nickname in use");
        }
        Ok(())
    }

    fn on_disconnect(&mut self, session: SessionId) {
        self.peers.remove(&session);
        match self.seating.remove_session(session) {
            Removal::Seated(color) => {
                if self.seating.bot_color().is_some() {
                    // The human walked out on the bot: tear the table down.
                    self.epoch += 1;
                    self.seating.clear_seats();
                    self.state = GameState::new();
                    self.phase = Phase::Waiting;
                    self.log.push("Bot match abandoned".to_string());
                    self.broadcast();
                } else if self.phase == Phase::Active {
                    self.log.push(format!("{color} left the match and forfeits"));
                    self.state.forfeit(color);
                    self.after_commit();
                } else {
                    self.broadcast();
                }
            }
            Removal::Queued => self.broadcast(),
            Removal::NotPresent => {}
        }
    }

    // ------------------------------------------------------------------
    // Actions (the validator)
    // ------------------------------------------------------------------

    fn on_action(&mut self, session: SessionId, wire: WireAction) {
        if let WireAction::Forfeit = wire {
            self.on_forfeit(session);
            return;
        }
        // Unauthorised senders are dropped without a word.
        let Some(color) = self.seating.color_of(session) else {
            return;
        };
        if self.phase != Phase::Active || color != self.state.current {
            return;
        }
        let action = match decode_action(color, &wire) {
            Ok(action) => action,
            Err(()) => {
                self.send_error(session, "malformed action");
                return;
            }
        };
        let entry = self.describe(color, &action);
        match self.state.play(color, action) {
            Ok(()) => {
                self.log.push(entry);
                self.after_commit();
            }
            Err(err) => {
                tracing::debug!(%err, session, "action rejected");
                self.send_error(session, "that action is not allowed");
            }
        }
    }

    fn on_forfeit(&mut self, session: SessionId) {
        let Some(color) = self.seating.color_of(session) else {
            return;
        };
        if self.phase != Phase::Active {
            return;
        }
        self.log.push(format!("{} concedes", self.seat_name(color)));
        self.state.forfeit(color);
        self.after_commit();
    }

    // ------------------------------------------------------------------
    // Commit plumbing
    // ------------------------------------------------------------------

    fn after_commit(&mut self) {
        if self.state.winner.is_none() && !self.state.board.is_hive_connected() {
            // This cannot happen through the rules; treat it as fatal for
            // the match but not for the process.
            tracing::error!("hive split after a committed action");
            self.state.declare_draw();
            self.log
                .push("Internal error: the hive came apart; the match is a draw".to_string());
        }
        match self.state.winner {
            Some(winner) => self.on_terminal(winner),
            None => {
                self.turn_started = Instant::now();
                self.maybe_schedule_bot(false);
            }
        }
        self.broadcast();
    }

    fn on_terminal(&mut self, winner: Winner) {
        self.phase = Phase::Rotation;
        self.epoch += 1;
        match winner_color(winner) {
            Some(color) => {
                if let Some(seat) = self.seating.seat_mut(color) {
                    seat.wins += 1;
                }
                self.log
                    .push(format!("{} wins the match", self.seat_name(color)));
            }
            None => self.log.push("The match is a draw".to_string()),
        }
        let events = self.events.clone();
        let epoch = self.epoch;
        tokio::spawn(async move {
            tokio::time::sleep(ROTATION_PAUSE).await;
            let _ = events.send(Event::NextMatch { epoch });
        });
    }

    fn on_next_match(&mut self, epoch: u64) {
        if epoch != self.epoch || self.phase != Phase::Rotation {
            return;
        }
        self.seating.rotate(winner_color_opt(self.state.winner));
        if self.seating.both_seated() {
            self.start_match(false);
        } else {
            self.phase = Phase::Waiting;
            self.broadcast();
        }
    }

    fn start_match(&mut self, immediate_bot: bool) {
        self.epoch += 1;
        self.state = GameState::new();
        self.phase = Phase::Active;
        self.turn_started = Instant::now();
        self.log.push(format!(
            "New match: {} (White) vs {} (Black)",
            self.seat_name(Color::White),
            self.seat_name(Color::Black)
        ));
        self.broadcast();
        self.maybe_schedule_bot(immediate_bot);
    }

    // ------------------------------------------------------------------
    // Clock and bot
    // ------------------------------------------------------------------

    fn handle_clock(&mut self) {
        if self.phase != Phase::Active {
            return;
        }
        if self.turn_started.elapsed() < TURN_BUDGET {
            return;
        }
        // Timeouts never touch the board or a hand.
        let expired = self.state.current;
        self.state.pass();
        self.log
            .push(format!("{expired}'s move clock expired; turn passed"));
        self.turn_started = Instant::now();
        self.maybe_schedule_bot(false);
        self.broadcast();
    }

    fn maybe_schedule_bot(&mut self, immediate: bool) {
        if self.phase != Phase::Active {
            return;
        }
        if !self
            .seating
            .seat(self.state.current)
            .is_some_and(Seat::is_bot)
        {
            return;
        }
        let events = self.events.clone();
        let epoch = self.epoch;
        if immediate {
            let _ = events.send(Event::BotTurn { epoch });
            return;
        }
        let delay = Duration::from_millis(self.rng.gen_range(BOT_DELAY_MIN_MS..=BOT_DELAY_MAX_MS));
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = events.send(Event::BotTurn { epoch });
        });
    }

    fn on_bot_turn(&mut self, epoch: u64) {
        if epoch != self.epoch || self.phase != Phase::Active {
            return;
        }
        let color = self.state.current;
        if !self.seating.seat(color).is_some_and(Seat::is_bot) {
            return;
        }

        let started = Instant::now();
        let action = self.bot.best_action(&self.state, color);
        let thought = started.elapsed();
        if thought > BOT_THINK_WARNING {
            tracing::warn!(?thought, "bot search ran long");
        }

        match action {
            Some(action) => {
                let entry = self.describe(color, &action);
                match self.state.play(color, action) {
                    Ok(()) => {
                        self.log.push(entry);
                        self.after_commit();
                    }
                    Err(err) => {
                        tracing::error!(%err, "bot proposed an illegal action");
                        self.state.pass();
                        self.log.push(format!("{BOT_NAME} passes"));
                        self.turn_started = Instant::now();
                        self.broadcast();
                    }
                }
            }
            None => {
                self.state.pass();
                self.log
                    .push(format!("{BOT_NAME} has no legal action and passes"));
                self.turn_started = Instant::now();
                self.broadcast();
            }
        }
    }

    // ------------------------------------------------------------------
    // Snapshots
    // ------------------------------------------------------------------

    fn snapshot(&self) -> Snapshot {
        let time_left = if self.phase == Phase::Active {
            TURN_BUDGET
                .saturating_sub(self.turn_started.elapsed())
                .as_secs()
        } else {
            0
        };
        Snapshot {
            board: protocol::board_view(&self.state.board),
            players: SeatsView {
                white: self.seat_view(Color::White),
                black: self.seat_view(Color::Black),
            },
            queue: self.seating.queue_names(),
            turn_number: self.state.turn_number,
            current_player: self.state.current,
            winner: self.state.winner,
            log: self.log.clone(),
            time_left,
        }
    }

    fn seat_view(&self, color: Color) -> Option<SeatView> {
        self.seating.seat(color).map(|seat| SeatView {
            id: seat.session.unwrap_or(0),
            nickname: seat.name.clone(),
            hand: SPECIES
                .into_iter()
                .map(|s| (s, self.state.hand(color).count(s)))
                .collect(),
            wins: seat.wins,
            is_bot: seat.is_bot().then_some(true),
        })
    }

    fn broadcast(&mut self) {
        match serde_json::to_string(&ServerMessage::Snapshot(self.snapshot())) {
            Ok(frame) => {
                self.peers.retain(|_, tx| tx.send(frame.clone()).is_ok());
            }
            Err(err) => tracing::error!(%err, "snapshot serialisation failed"),
        }
    }

    fn send_snapshot_to(&self, session: SessionId) {
        self.send_to(session, &ServerMessage::Snapshot(self.snapshot()));
    }

    fn send_error(&self, session: SessionId, message: &str) {
        self.send_to(
            session,
            &ServerMessage::Error {
                message: message.to_string(),
            },
        );
    }

    fn send_to(&self, session: SessionId, message: &ServerMessage) {
        let Some(tx) = self.peers.get(&session) else {
            return;
        };
        if let Ok(frame) = serde_json::to_string(message) {
            let _ = tx.send(frame);
        }
    }

    fn seat_name(&self, color: Color) -> String {
        self.seating
            .seat(color)
            .map(|s| s.name.clone())
            .unwrap_or_else(|| "-".to_string())
    }

    fn describe(&self, color: Color, action: &Action) -> String {
        match action {
            Action::Place { species, at } => format!("{color} places {species} at {at}"),
            Action::Move { from, to } => {
                let species = self
                    .state
                    .board
                    .top_at(*from)
                    .map(|p| p.species.name())
                    .unwrap_or("a piece");
                format!("{color} moves {species} from {from} to {to}")
            }
        }
    }
}

/// Structural validation of a wire action. Anything off - a bad coordinate
/// string, an out-of-bounds cell, a colour that is not the sender's, a cube
/// cross-check failure - is malformed.
fn decode_action(color: Color, wire: &WireAction) -> Result<Action, ()> {
    match wire {
        WireAction::Place {
            piece,
            hex,
            hex_obj,
        } => {
            if piece.color != color {
                return Err(());
            }
            let at: Hex = hex.parse().map_err(|_| ())?;
            if !at.in_bounds() {
                return Err(());
            }
            if let Some(obj) = hex_obj {
                if !obj.matches(at) {
                    return Err(());
                }
            }
            Ok(Action::Place {
                species: piece.species,
                at,
            })
        }
        WireAction::Move { from, to } => {
            let from: Hex = from.parse().map_err(|_| ())?;
            let to: Hex = to.parse().map_err(|_| ())?;
            if !from.in_bounds() || !to.in_bounds() {
                return Err(());
            }
            Ok(Action::Move { from, to })
        }
        WireAction::Forfeit => Err(()),
    }
}

fn winner_color(winner: Winner) -> Option<Color> {
    match winner {
        Winner::White => Some(Color::White),
        Winner::Black => Some(Color::Black),
        Winner::Draw => None,
    }
}

fn winner_color_opt(winner: Option<Winner>) -> Option<Color> {
    winner.and_then(winner_color)
}
