//! Prompt assembly: renders a transcript plus the newest user message into
//! the text sent to the completion API.

use crate::transcript::{Speaker, Transcript, Turn};

const USER_LABEL: &str = "User";
const BOT_LABEL: &str = "Bot";

fn render_turn(turn: &Turn) -> String {
    let label = match turn.speaker {
        Speaker::User => USER_LABEL,
        Speaker::Bot => BOT_LABEL,
    };
    format!("{label}: {}\n", turn.text)
}

/// Render a prompt from stored history plus the new user message.
///
/// Deterministic and side-effect free. When the full rendering would exceed
/// `budget` characters, the oldest turns are dropped from the rendering only
/// (the stored transcript is untouched) until it fits; the new user message
/// and the reply cue are always kept. How much history the store retains and
/// how much a single request may carry are separate knobs.
pub fn render(transcript: &Transcript, new_user_text: &str, budget: usize) -> String {
    let tail = format!("{USER_LABEL}: {new_user_text}\n{BOT_LABEL}:");
    let rendered: Vec<String> = transcript.turns().iter().map(render_turn).collect();

    let mut total: usize = rendered
        .iter()
        .map(|line| line.chars().count())
        .sum::<usize>()
        + tail.chars().count();

    let mut start = 0;
    while start < rendered.len() && total > budget {
        total -= rendered[start].chars().count();
        start += 1;
    }

    let mut prompt = String::new();
    for line in &rendered[start..] {
        prompt.push_str(line);
    }
    prompt.push_str(&tail);
    prompt
}
