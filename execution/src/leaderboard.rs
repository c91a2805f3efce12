//! Room standings for `/stats` and `/balance`.

use spinduel_types::{BalanceRecord, PlayerRecord, Symbol, UserId};
use std::cmp::Reverse;
use std::collections::HashMap;

pub const NO_STATS_TEXT: &str = "No stats yet.";
pub const NO_BALANCES_TEXT: &str = "No balances yet.";

/// Highest score first, then fewest games, then most recently played.
pub fn rank_players(players: &mut [PlayerRecord]) {
    players.sort_by_key(|player| {
        (
            Reverse(player.score()),
            player.statistics.total_games,
            Reverse(player.last_played_at_ms),
        )
    });
}

/// Richest first.
pub fn rank_balances(balances: &mut [BalanceRecord]) {
    balances.sort_by_key(|balance| Reverse(balance.amount));
}

pub fn format_stats(mut players: Vec<PlayerRecord>) -> String {
    if players.is_empty() {
        return NO_STATS_TEXT.to_string();
    }
    rank_players(&mut players);

    players
        .iter()
        .enumerate()
        .map(|(i, player)| {
            let stats = &player.statistics;
            format!(
                "{}. {} - {} pts ({}:{} {}:{} {}:{} {}:{} 🎰:{})",
                i + 1,
                player.display_name(),
                player.score(),
                Symbol::Seven.emoji(),
                stats.seven_wins,
                Symbol::Bar.emoji(),
                stats.bar_wins,
                Symbol::Cherry.emoji(),
                stats.cherry_wins,
                Symbol::Lemon.emoji(),
                stats.lemon_wins,
                stats.total_games,
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// `names` maps users to the display name of their statistics row.
pub fn format_balances(mut balances: Vec<BalanceRecord>, names: &HashMap<UserId, String>) -> String {
    if balances.is_empty() {
        return NO_BALANCES_TEXT.to_string();
    }
    rank_balances(&mut balances);

    balances
        .iter()
        .enumerate()
        .map(|(i, balance)| {
            let name = names
                .get(&balance.user)
                .filter(|name| !name.is_empty())
                .cloned()
                .unwrap_or_else(|| format!("User_{}", balance.user));
            format!("{}. {} - {}$", i + 1, name, balance.amount)
        })
        .collect::<Vec<_>>()
        .join("\n")
}
