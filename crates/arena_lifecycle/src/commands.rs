//! Operator and player commands
//!
//! Commands are plain data so they can cross a channel into the tick thread
//! or come in over a wire. Turning chat text into commands happens elsewhere.

use arena_core::{ArenaId, PlayerId};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A request against the arena engine
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum ArenaCommand {
    EnableAutoEnter { player: PlayerId },
    DisableAutoEnter { player: PlayerId },
    SwapCharacters { player: PlayerId },
    ForceActivate { player: PlayerId, to_arena: bool },
    Enter { player: PlayerId, arena: ArenaId },
    Exit { player: PlayerId, arena: ArenaId },
    StartArena { arena: ArenaId },
    EndArena { arena: ArenaId },
}

impl ArenaCommand {
    /// Player the command acts on, if any
    pub fn player(&self) -> Option<PlayerId> {
        match self {
            Self::EnableAutoEnter { player }
            | Self::DisableAutoEnter { player }
            | Self::SwapCharacters { player }
            | Self::ForceActivate { player, .. }
            | Self::Enter { player, .. }
            | Self::Exit { player, .. } => Some(*player),
            Self::StartArena { .. } | Self::EndArena { .. } => None,
        }
    }
}

impl fmt::Display for ArenaCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EnableAutoEnter { player } => write!(f, "enable auto-enter for {}", player),
            Self::DisableAutoEnter { player } => write!(f, "disable auto-enter for {}", player),
            Self::SwapCharacters { player } => write!(f, "swap characters of {}", player),
            Self::ForceActivate { player, to_arena } => {
                let body = if *to_arena { "arena" } else { "normal" };
                write!(f, "activate {} body of {}", body, player)
            }
            Self::Enter { player, arena } => write!(f, "enter {} into {}", player, arena),
            Self::Exit { player, arena } => write!(f, "exit {} from {}", player, arena),
            Self::StartArena { arena } => write!(f, "start {}", arena),
            Self::EndArena { arena } => write!(f, "end {}", arena),
        }
    }
}
