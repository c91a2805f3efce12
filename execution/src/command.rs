/// Emoji of the platform's slot-machine dice.
pub const SLOT_MACHINE_EMOJI: &str = "🎰";

/// A chat action the coordinator understands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Stats,
    Balance,
    /// `/duel <username>`; `target` is `None` when the argument is missing.
    Duel { target: Option<String> },
    AcceptDuel,
    DeclineDuel,
    CancelDuel,
    Spin { value: u64 },
}

impl Command {
    /// Parse a text message. Unknown text yields `None`.
    ///
    /// A `@botname` suffix on the command word is ignored, as chat clients
    /// append it when a command is picked from a menu.
    pub fn parse(text: &str) -> Option<Self> {
        let text = text.trim();
        let (word, rest) = match text.split_once(char::is_whitespace) {
            Some((word, rest)) => (word, rest.trim()),
            None => (text, ""),
        };
        let word = word.split('@').next().unwrap_or(word);

        let command = match word {
            "/duel" => {
                let target = rest
                    .split_whitespace()
                    .next()
                    .map(|target| target.trim_start_matches('@'))
                    .filter(|target| !target.is_empty())
                    .map(str::to_string);
                return Some(Command::Duel { target });
            }
            "/stats" => Command::Stats,
            "/balance" => Command::Balance,
            "/acceptDuel" => Command::AcceptDuel,
            "/declineDuel" => Command::DeclineDuel,
            "/cancelDuel" => Command::CancelDuel,
            _ => return None,
        };
        rest.is_empty().then_some(command)
    }

    /// Interpret an animated dice message. Only slot-machine rolls count.
    pub fn from_dice(emoji: &str, value: u64) -> Option<Self> {
        (emoji == SLOT_MACHINE_EMOJI).then_some(Command::Spin { value })
    }
}
