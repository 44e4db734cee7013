//! Debug Console
//!
//! Slash commands typed on the server's stdin. They drive the authority the
//! same way a connected observer would, plus a few inspection helpers.

use crate::quest::{QuestEvent, QuestId, StepIndex, Tag};
use crate::world::PlayerId;

pub const HELP: &str = "Commands: /activate <quest> [step] [focus], /focus <quest>, /reset <quest>, \
/arrive <player> <place>, /leave <player> <place>, /talk <player> <entity>, \
/kill <player> <entity>, /gather <player> <item> [amount], /catch <player> <tag>, \
/join <player>, /part <player>, /status, /quests, /help, /quit";

#[derive(Debug, Clone, PartialEq)]
pub enum ConsoleCommand {
    Activate {
        quest_id: QuestId,
        start_at: StepIndex,
        focus: bool,
    },
    Focus(QuestId),
    Reset(QuestId),
    /// A gameplay event to route
    Event(QuestEvent),
    Join(PlayerId),
    Part(PlayerId),
    Status,
    Quests,
    Help,
    Quit,
}

/// Parse one console line. Blank lines yield `Ok(None)`.
pub fn parse_command(line: &str) -> Result<Option<ConsoleCommand>, String> {
    let parts: Vec<&str> = line.split_whitespace().collect();
    let Some(first) = parts.first() else {
        return Ok(None);
    };
    let command = first.to_lowercase();

    let parsed = match command.as_str() {
        "/activate" => {
            // /activate <quest> [step] [focus]
            let quest_id = quest_arg(&parts, "/activate <quest> [step] [focus]")?;
            let mut start_at = 0;
            let mut focus = false;
            for extra in &parts[2..] {
                if extra.eq_ignore_ascii_case("focus") {
                    focus = true;
                } else {
                    start_at = extra
                        .parse()
                        .map_err(|_| format!("Invalid step: {}", extra))?;
                }
            }
            ConsoleCommand::Activate { quest_id, start_at, focus }
        }
        "/focus" => ConsoleCommand::Focus(quest_arg(&parts, "/focus <quest>")?),
        "/reset" => ConsoleCommand::Reset(quest_arg(&parts, "/reset <quest>")?),
        "/arrive" => {
            let (player, place) = player_and_tag(&parts, "/arrive <player> <place>")?;
            ConsoleCommand::Event(QuestEvent::Arrived { player, place })
        }
        "/leave" => {
            let (player, place) = player_and_tag(&parts, "/leave <player> <place>")?;
            ConsoleCommand::Event(QuestEvent::Left { player, place })
        }
        "/talk" => {
            let (player, entity) = player_and_tag(&parts, "/talk <player> <entity>")?;
            ConsoleCommand::Event(QuestEvent::TalkedTo { player, entity })
        }
        "/kill" => {
            let (player, entity) = player_and_tag(&parts, "/kill <player> <entity>")?;
            ConsoleCommand::Event(QuestEvent::Killed { player, entity })
        }
        "/gather" => {
            let (player, item) = player_and_tag(&parts, "/gather <player> <item> [amount]")?;
            let amount = match parts.get(3) {
                Some(raw) => match raw.parse::<f32>() {
                    Ok(v) if v.is_finite() && v > 0.0 => v,
                    _ => return Err(format!("Invalid amount: {}", raw)),
                },
                None => 1.0,
            };
            ConsoleCommand::Event(QuestEvent::Gathered { player, item, amount })
        }
        "/catch" => {
            let (player, tag) = player_and_tag(&parts, "/catch <player> <tag>")?;
            ConsoleCommand::Event(QuestEvent::Caught { player, tag })
        }
        "/join" => ConsoleCommand::Join(player_arg(&parts, "/join <player>")?),
        "/part" => ConsoleCommand::Part(player_arg(&parts, "/part <player>")?),
        "/status" => ConsoleCommand::Status,
        "/quests" => ConsoleCommand::Quests,
        "/help" => ConsoleCommand::Help,
        "/quit" | "/exit" => ConsoleCommand::Quit,
        other => return Err(format!("Unknown command: {}. Try /help", other)),
    };
    Ok(Some(parsed))
}

fn quest_arg(parts: &[&str], usage: &str) -> Result<QuestId, String> {
    let raw = parts.get(1).ok_or_else(|| format!("Usage: {}", usage))?;
    raw.parse().map_err(|_| format!("Invalid quest id: {}", raw))
}

fn player_arg(parts: &[&str], usage: &str) -> Result<PlayerId, String> {
    parts
        .get(1)
        .map(|p| PlayerId::new(*p))
        .ok_or_else(|| format!("Usage: {}", usage))
}

fn player_and_tag(parts: &[&str], usage: &str) -> Result<(PlayerId, Tag), String> {
    match (parts.get(1), parts.get(2)) {
        (Some(player), Some(tag)) => Ok((PlayerId::new(*player), Tag::new(*tag))),
        _ => Err(format!("Usage: {}", usage)),
    }
}
