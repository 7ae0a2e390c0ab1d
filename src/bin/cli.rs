#![cfg(not(tarpaulin_include))]

use env_logger::Env;
use log::warn;
use rand::SeedableRng;
use rand::rngs::StdRng;
use std::env;
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use vocab_cards::practice::{Feedback, PracticeSnapshot};
use vocab_cards::{CardRepository, CardStore, PracticeEngine};

const HELP: &str = "Commands: :hint  :retype  :next  :exit  (anything else is checked as an answer)";

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(Env::default().default_filter_or("warn")).init();

    let args: Vec<String> = env::args().collect();
    if args.len() != 3 {
        eprintln!("Usage: {} <data-dir> <username>", args[0]);
        return Ok(());
    }
    let data_dir = PathBuf::from(&args[1]);
    let username = &args[2];

    let store = CardStore::new(&data_dir)?;
    let mut engine = PracticeEngine::load(&store, username, StdRng::from_entropy());

    let stdin = io::stdin();
    let mut lines = stdin.lock().lines();

    loop {
        match engine.snapshot() {
            PracticeSnapshot::Empty => {
                println!("No cards to practise. Add some first.");
                return Ok(());
            }
            PracticeSnapshot::Setup { available, presets } => {
                println!("\n{} cards available.", available);
                let choices: Vec<String> = presets
                    .iter()
                    .filter(|p| p.enabled)
                    .map(|p| p.label.clone())
                    .collect();
                prompt(&format!(
                    "Session size [{}] or a number, :quit to leave: ",
                    choices.join(" / ")
                ))?;
                let Some(line) = lines.next() else {
                    return Ok(());
                };
                let line = line?;
                let choice = line.trim();
                let result = match choice {
                    ":quit" | ":q" => return Ok(()),
                    "all" | "All" | "" => engine.start_all(),
                    other => engine.start_custom(other),
                };
                if let Err(e) = result {
                    println!("{}", e);
                }
            }
            PracticeSnapshot::Active(card) => {
                if card.feedback == Feedback::None {
                    println!(
                        "\n[{}/{}] {}",
                        card.position + 1,
                        card.queue_len,
                        card.prompt
                    );
                    if let Some(hint) = &card.hint {
                        println!("  hint: {}", hint);
                    }
                    prompt("> ")?;
                } else {
                    prompt("[Enter] next, :retype to try again > ")?;
                }

                let Some(line) = lines.next() else {
                    return Ok(());
                };
                let line = line?;
                let outcome = match line.trim() {
                    ":help" => {
                        println!("{}", HELP);
                        Ok(())
                    }
                    ":hint" => engine.reveal_hint().map(|shown| {
                        if !shown {
                            println!("No hint for this card.");
                        }
                    }),
                    ":retype" => engine.retype(),
                    ":next" => engine.advance().map(|_| ()),
                    ":exit" => engine.exit(),
                    "" if card.feedback != Feedback::None => engine.advance().map(|_| ()),
                    _ => engine.submit(&line).map(|feedback| {
                        print_feedback(feedback, &engine.snapshot());
                    }),
                };
                if let Err(e) = outcome {
                    println!("{}", e);
                }
            }
            PracticeSnapshot::Results(results) => {
                println!("\nSession complete.");
                println!(
                    "Score: {}/{}{}",
                    results.score.correct,
                    results.score.total,
                    results
                        .accuracy
                        .map(|a| format!(" ({}%)", a))
                        .unwrap_or_default()
                );
                if results.skipped > 0 {
                    println!("Skipped: {}", results.skipped);
                }
                for entry in &results.errors {
                    println!(
                        "  {}: you typed {:?}, answer {:?}",
                        entry.card.meaning, entry.user_answer, entry.card.term
                    );
                }

                prompt("Practice again? [y/N] ")?;
                let again = match lines.next() {
                    Some(line) => line?.trim().eq_ignore_ascii_case("y"),
                    None => false,
                };
                if !again {
                    return Ok(());
                }
                engine.restart()?;
                match store.list_cards(username) {
                    Ok(cards) => engine.reload(cards),
                    Err(e) => warn!("Could not reload cards: {}", e),
                }
            }
        }
    }
}

fn print_feedback(feedback: Feedback, snapshot: &PracticeSnapshot) {
    let answer = match snapshot {
        PracticeSnapshot::Active(card) => card.answer.clone().unwrap_or_default(),
        _ => String::new(),
    };
    match feedback {
        Feedback::Correct => println!("Correct!"),
        Feedback::Incorrect => println!("Incorrect. The answer is {:?}", answer),
        Feedback::None => {}
    }
}

fn prompt(text: &str) -> io::Result<()> {
    print!("{}", text);
    io::stdout().flush()
}
