//! Keyboard shortcuts.
//!
//! Bindings match on the logical key, so symbols such as `(` or `>` work on
//! any layout that can type them and Shift is already folded into the
//! character.

use std::fmt;

use winit::keyboard::{Key, ModifiersState, NamedKey};

use crate::display::ChannelView;
use crate::image::ImageAdjustment;
use crate::viewer::Command;

/// Exposure change per `[` / `]`, in stops.
pub const EXPOSURE_STEP: f32 = 0.1;
/// Exposure change per `{` / `}` (shifted brackets), in stops.
pub const EXPOSURE_STEP_LARGE: f32 = 0.5;
/// Gamma change per `(` / `)`.
pub const GAMMA_STEP: f32 = 0.05;

/// What has to be pressed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyTrigger {
    Named(NamedKey),
    /// Lowercase character as typed
    Char(String),
}

/// A key plus whether Ctrl is held.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyChord {
    pub trigger: KeyTrigger,
    pub ctrl: bool,
}

impl KeyChord {
    pub fn char(c: &str) -> Self {
        Self {
            trigger: KeyTrigger::Char(c.to_lowercase()),
            ctrl: false,
        }
    }

    pub fn ctrl(c: &str) -> Self {
        Self {
            trigger: KeyTrigger::Char(c.to_lowercase()),
            ctrl: true,
        }
    }

    pub fn named(key: NamedKey) -> Self {
        Self {
            trigger: KeyTrigger::Named(key),
            ctrl: false,
        }
    }

    /// Chord for a key event, or `None` for keys that cannot be bound.
    pub fn from_key(key: &Key, modifiers: ModifiersState) -> Option<Self> {
        let trigger = match key {
            Key::Named(named) => KeyTrigger::Named(*named),
            Key::Character(c) => KeyTrigger::Char(c.to_lowercase()),
            _ => return None,
        };
        Some(Self {
            trigger,
            ctrl: modifiers.control_key(),
        })
    }
}

impl fmt::Display for KeyChord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.ctrl {
            f.write_str("Ctrl+")?;
        }
        match &self.trigger {
            KeyTrigger::Named(named) => write!(f, "{:?}", named),
            KeyTrigger::Char(c) => f.write_str(&c.to_uppercase()),
        }
    }
}

/// Shortcut table.
#[derive(Debug, Clone)]
pub struct KeyBindings {
    bindings: Vec<(KeyChord, Command)>,
}

impl Default for KeyBindings {
    fn default() -> Self {
        use Command::*;
        let adjust = Command::Adjust;
        Self {
            bindings: vec![
                (KeyChord::named(NamedKey::PageUp), PrevImage),
                (KeyChord::named(NamedKey::PageDown), NextImage),
                (KeyChord::char("t"), ToggleImage),
                (KeyChord::char("<"), PrevSubimage),
                (KeyChord::char(">"), NextSubimage),
                (KeyChord::char("+"), ZoomIn),
                (KeyChord::char("="), ZoomIn),
                (KeyChord::char("-"), ZoomOut),
                (KeyChord::char("0"), NormalSize),
                (KeyChord::char("f"), FitWindow),
                (KeyChord::char("w"), FitWindowToImage),
                (KeyChord::ctrl("f"), ToggleFullScreen),
                (KeyChord::named(NamedKey::F11), ToggleFullScreen),
                (KeyChord::char("c"), SetChannel(ChannelView::FullColor)),
                (KeyChord::char("r"), SetChannel(ChannelView::Red)),
                (KeyChord::char("g"), SetChannel(ChannelView::Green)),
                (KeyChord::char("b"), SetChannel(ChannelView::Blue)),
                (KeyChord::char("a"), SetChannel(ChannelView::Alpha)),
                (KeyChord::char("l"), SetChannel(ChannelView::Luminance)),
                (KeyChord::char(","), PrevChannel),
                (KeyChord::char("."), NextChannel),
                (
                    KeyChord::char("["),
                    adjust(ImageAdjustment::AdjustExposure(-EXPOSURE_STEP)),
                ),
                (
                    KeyChord::char("]"),
                    adjust(ImageAdjustment::AdjustExposure(EXPOSURE_STEP)),
                ),
                (
                    KeyChord::char("{"),
                    adjust(ImageAdjustment::AdjustExposure(-EXPOSURE_STEP_LARGE)),
                ),
                (
                    KeyChord::char("}"),
                    adjust(ImageAdjustment::AdjustExposure(EXPOSURE_STEP_LARGE)),
                ),
                (
                    KeyChord::char("("),
                    adjust(ImageAdjustment::AdjustGamma(-GAMMA_STEP)),
                ),
                (
                    KeyChord::char(")"),
                    adjust(ImageAdjustment::AdjustGamma(GAMMA_STEP)),
                ),
                (
                    KeyChord::char("*"),
                    adjust(ImageAdjustment::ResetAdjustments),
                ),
                (KeyChord::ctrl("r"), Reload),
                (KeyChord::ctrl("w"), CloseCurrent),
                (KeyChord::char("p"), TogglePixelPeek),
                (KeyChord::char("i"), LogInfo),
                (KeyChord::char("h"), ShowHelp),
                (KeyChord::char("?"), ShowHelp),
            ],
        }
    }
}

impl KeyBindings {
    /// Command for a key press, if any.
    pub fn command_for_key(&self, key: &Key, modifiers: ModifiersState) -> Option<Command> {
        let chord = KeyChord::from_key(key, modifiers)?;
        self.command_for_chord(&chord).cloned()
    }

    pub fn command_for_chord(&self, chord: &KeyChord) -> Option<&Command> {
        self.bindings
            .iter()
            .find(|(c, _)| c == chord)
            .map(|(_, command)| command)
    }

    /// `Key: action` lines, logged by [`Command::ShowHelp`].
    pub fn describe(&self) -> Vec<String> {
        self.bindings
            .iter()
            .map(|(chord, command)| format!("{}: {:?}", chord, command))
            .collect()
    }
}
