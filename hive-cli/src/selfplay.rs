//! Selfplay command - bot-vs-bot games on the engine
//!
//! Doubles as a smoke test: every action the bots commit goes through the
//! same rule checks the server applies to humans.

use anyhow::{bail, Result};
use clap::Args;

use hive_core::{BotPlayer, GameState, Winner, DEFAULT_DEPTH};

#[derive(Args)]
pub struct SelfplayArgs {
    /// Number of games to play
    #[arg(long, default_value = "1")]
    pub games: usize,

    /// Search depth for both bots
    #[arg(long, default_value_t = DEFAULT_DEPTH)]
    pub depth: u32,

    /// Cap on committed turns per game
    #[arg(long, default_value = "200")]
    pub max_turns: u32,

    /// Output results as JSON
    #[arg(long)]
    pub json: bool,
}

/// Result of a single game
#[derive(Clone, Debug)]
struct GameRecord {
    game_number: usize,
    winner: Option<Winner>,
    turns: u32,
}

/// Aggregated results
#[derive(Clone, Debug)]
struct SelfplayResults {
    games: Vec<GameRecord>,
    white_wins: usize,
    black_wins: usize,
    unfinished: usize,
    avg_turns: f32,
}

/// Run selfplay command
pub fn run(args: SelfplayArgs) -> Result<()> {
    if args.games == 0 {
        bail!("nothing to do: --games 0");
    }

    tracing::info!(
        "Starting selfplay: {} game(s) at depth {}",
        args.games,
        args.depth
    );

    let results = play_all(&args)?;

    report_results(&results, &args);

    Ok(())
}

fn play_all(args: &SelfplayArgs) -> Result<SelfplayResults> {
    let mut games = Vec::with_capacity(args.games);
    for game_number in 1..=args.games {
        let record = play_single_game(game_number, args)?;
        tracing::info!(
            "Game {}: {:?} after {} turns",
            record.game_number,
            record.winner,
            record.turns
        );
        games.push(record);
    }
    Ok(compute_statistics(games))
}

fn play_single_game(game_number: usize, args: &SelfplayArgs) -> Result<GameRecord> {
    let bot = BotPlayer::new(args.depth);
    let mut state = GameState::new();

    while state.winner.is_none() && state.turn_number <= args.max_turns {
        let mover = state.current;
        match bot.best_action(&state, mover) {
            Some(action) => {
                if let Err(err) = state.play(mover, action) {
                    bail!("bot produced an illegal action at turn {}: {err}", state.turn_number);
                }
            }
            None => state.pass(),
        }
        if !state.board.is_hive_connected() {
            bail!("hive split at turn {}", state.turn_number);
        }
    }

    Ok(GameRecord {
        game_number,
        winner: state.winner,
        turns: state.turn_number,
    })
}

fn compute_statistics(games: Vec<GameRecord>) -> SelfplayResults {
    let white_wins = games
        .iter()
        .filter(|g| g.winner == Some(Winner::White))
        .count();
    let black_wins = games
        .iter()
        .filter(|g| g.winner == Some(Winner::Black))
        .count();
    let unfinished = games.iter().filter(|g| g.winner.is_none()).count();

    let total_turns: u32 = games.iter().map(|g| g.turns).sum();
    let avg_turns = if games.is_empty() {
        0.0
    } else {
        total_turns as f32 / games.len() as f32
    };

    SelfplayResults {
        games,
        white_wins,
        black_wins,
        unfinished,
        avg_turns,
    }
}

fn report_results(results: &SelfplayResults, args: &SelfplayArgs) {
    if args.json {
        print_json_results(results);
    } else {
        print_text_results(results);
    }
}

fn print_json_results(results: &SelfplayResults) {
    #[derive(serde::Serialize)]
    struct JsonGame {
        game_number: usize,
        winner: Option<Winner>,
        turns: u32,
    }

    #[derive(serde::Serialize)]
    struct JsonOutput {
        total_games: usize,
        white_wins: usize,
        black_wins: usize,
        unfinished: usize,
        avg_turns: f32,
        games: Vec<JsonGame>,
    }

    let output = JsonOutput {
        total_games: results.games.len(),
        white_wins: results.white_wins,
        black_wins: results.black_wins,
        unfinished: results.unfinished,
        avg_turns: results.avg_turns,
        games: results
            .games
            .iter()
            .map(|g| JsonGame {
                game_number: g.game_number,
                winner: g.winner,
                turns: g.turns,
            })
            .collect(),
    };

    if let Ok(json) = serde_json::to_string_pretty(&output) {
        println!("{}", json);
    }
}

fn print_text_results(results: &SelfplayResults) {
    let total = results.games.len();

    println!("\n=== Selfplay Results ===");
    println!("Total games: {}", total);
    println!("White wins:  {}", results.white_wins);
    println!("Black wins:  {}", results.black_wins);
    println!("Unfinished:  {}", results.unfinished);
    println!("Avg turns:   {:.1}", results.avg_turns);

    println!("\nGame details:");
    for game in &results.games {
        println!(
            "  Game {}: {:?} after {} turns",
            game.game_number, game.winner, game.turns
        );
    }
}
