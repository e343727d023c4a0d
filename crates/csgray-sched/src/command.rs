//! The packed command word shared between coordinator and workers.

use std::fmt;

/// What a dispatch asks the workers to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum CommandKind {
    /// Run `update_slice`.
    Update = 1,
    /// Run `render_slice`.
    Render = 2,
    /// Leave the worker loop.
    Exit = 3,
}

impl fmt::Display for CommandKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CommandKind::Update => "update",
            CommandKind::Render => "render",
            CommandKind::Exit => "exit",
        };
        f.write_str(name)
    }
}

/// A `(kind, phase)` pair, packed as `kind << 16 | phase`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Command {
    /// Dispatch kind.
    pub kind: CommandKind,
    /// Phase number within the kind.
    pub phase: u16,
}

impl Command {
    /// Update pass `phase`.
    pub const fn update(phase: u16) -> Self {
        Self {
            kind: CommandKind::Update,
            phase,
        }
    }

    /// Render pass `phase`.
    pub const fn render(phase: u16) -> Self {
        Self {
            kind: CommandKind::Render,
            phase,
        }
    }

    /// Shutdown.
    pub const EXIT: Self = Self {
        kind: CommandKind::Exit,
        phase: 0,
    };

    /// Encode into one word.
    pub const fn pack(self) -> u32 {
        (self.kind as u32) << 16 | self.phase as u32
    }

    /// Decode a word written by [`Command::pack`]. Unknown kinds decode as
    /// [`CommandKind::Exit`].
    pub const fn unpack(word: u32) -> Self {
        let kind = match word >> 16 {
            1 => CommandKind::Update,
            2 => CommandKind::Render,
            _ => CommandKind::Exit,
        };
        Self {
            kind,
            phase: (word & 0xffff) as u16,
        }
    }
}
