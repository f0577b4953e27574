use std::collections::HashSet;

use anyhow::{anyhow, Result};
use glam::Vec2;
use serde::{Deserialize, Serialize};

use crate::camera::MoveDirection;
use crate::render::PolygonMode;

/// Degrees the light turns per frame while Q or E is held.
pub const LIGHT_TURN_STEP: f32 = 1.0;

/// Identifier for a physical keyboard key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum KeyCode {
    Named(NamedKey),
    Character(char),
}

impl KeyCode {
    pub fn from_name(name: &str) -> Option<Self> {
        if let Some(key) = parse_named_key(name) {
            return Some(Self::Named(key));
        }
        let mut chars = name.chars();
        match (chars.next(), chars.next()) {
            (Some(ch), None) if ch.is_ascii_alphabetic() => {
                Some(Self::Character(ch.to_ascii_uppercase()))
            }
            _ => None,
        }
    }
}

fn parse_named_key(name: &str) -> Option<NamedKey> {
    use NamedKey::*;
    let key = match name {
        "Left" => Left,
        "Right" => Right,
        "Up" => Up,
        "Down" => Down,
        "Escape" | "Esc" => Escape,
        _ => return None,
    };
    Some(key)
}

/// Non-character keys the viewer reacts to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NamedKey {
    Left,
    Right,
    Up,
    Down,
    Escape,
}

/// Abstract command consumed by the frame scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum InputCommand {
    Move(MoveDirection),
    /// Mouse motion in pixels. Positive `dy` looks up.
    RotateCamera { dx: f32, dy: f32 },
    RollLeft,
    RollRight,
    /// Light angle delta in degrees.
    RotateLight(f32),
    SetSecondLight(bool),
    SetFog(bool),
    SetPolygonMode(PolygonMode),
    ToggleDepthView,
    ToggleAnimation,
    RequestClose,
}

impl InputCommand {
    /// Parses the names accepted by `--commands`.
    ///
    /// `look:<dx>:<dy>` produces a mouse rotation of the given pixel deltas.
    pub fn from_name(name: &str) -> Option<Self> {
        use InputCommand::*;
        let name = name.trim();
        if let Some(deltas) = name.strip_prefix("look:") {
            let (dx, dy) = deltas.split_once(':')?;
            return Some(RotateCamera {
                dx: dx.trim().parse().ok()?,
                dy: dy.trim().parse().ok()?,
            });
        }
        let command = match name {
            "forward" => Move(MoveDirection::Forward),
            "backward" => Move(MoveDirection::Backward),
            "left" => Move(MoveDirection::Left),
            "right" => Move(MoveDirection::Right),
            "up" => Move(MoveDirection::Up),
            "down" => Move(MoveDirection::Down),
            "roll-left" => RollLeft,
            "roll-right" => RollRight,
            "light-left" => RotateLight(-LIGHT_TURN_STEP),
            "light-right" => RotateLight(LIGHT_TURN_STEP),
            "second-light-on" => SetSecondLight(true),
            "second-light-off" => SetSecondLight(false),
            "fog-on" => SetFog(true),
            "fog-off" => SetFog(false),
            "fill" => SetPolygonMode(PolygonMode::Fill),
            "points" => SetPolygonMode(PolygonMode::Point),
            "wireframe" => SetPolygonMode(PolygonMode::Line),
            "depth-view" => ToggleDepthView,
            "animation" => ToggleAnimation,
            "close" => RequestClose,
            _ => return None,
        };
        Some(command)
    }

    /// Parses a comma separated command list.
    pub fn parse_list(list: &str) -> Result<Vec<Self>> {
        list.split(',')
            .filter(|name| !name.trim().is_empty())
            .map(|name| {
                Self::from_name(name).ok_or_else(|| anyhow!("unknown command `{}`", name.trim()))
            })
            .collect()
    }
}

/// Commands repeated every frame while their key is held, in the order the
/// viewer has always processed them.
const HELD_BINDINGS: [(KeyCode, InputCommand); 17] = [
    (KeyCode::Character('W'), InputCommand::Move(MoveDirection::Forward)),
    (KeyCode::Character('S'), InputCommand::Move(MoveDirection::Backward)),
    (KeyCode::Character('A'), InputCommand::Move(MoveDirection::Left)),
    (KeyCode::Character('D'), InputCommand::Move(MoveDirection::Right)),
    (KeyCode::Character('Q'), InputCommand::RotateLight(-LIGHT_TURN_STEP)),
    (KeyCode::Character('E'), InputCommand::RotateLight(LIGHT_TURN_STEP)),
    (KeyCode::Named(NamedKey::Left), InputCommand::RollLeft),
    (KeyCode::Named(NamedKey::Right), InputCommand::RollRight),
    (KeyCode::Named(NamedKey::Up), InputCommand::Move(MoveDirection::Up)),
    (KeyCode::Named(NamedKey::Down), InputCommand::Move(MoveDirection::Down)),
    (KeyCode::Character('N'), InputCommand::SetSecondLight(true)),
    (KeyCode::Character('M'), InputCommand::SetSecondLight(false)),
    (KeyCode::Character('F'), InputCommand::SetFog(true)),
    (KeyCode::Character('G'), InputCommand::SetFog(false)),
    (KeyCode::Character('I'), InputCommand::SetPolygonMode(PolygonMode::Fill)),
    (KeyCode::Character('O'), InputCommand::SetPolygonMode(PolygonMode::Point)),
    (KeyCode::Character('P'), InputCommand::SetPolygonMode(PolygonMode::Line)),
];

/// Commands fired once per key press.
fn pressed_binding(key: KeyCode) -> Option<InputCommand> {
    match key {
        KeyCode::Character('Z') => Some(InputCommand::ToggleDepthView),
        KeyCode::Character('X') => Some(InputCommand::ToggleAnimation),
        KeyCode::Named(NamedKey::Escape) => Some(InputCommand::RequestClose),
        _ => None,
    }
}

/// Keyboard and mouse state collected between frames.
#[derive(Debug, Default)]
pub struct InputState {
    keys: HashSet<KeyCode>,
    pressed: Vec<InputCommand>,
    last_cursor: Option<Vec2>,
    mouse_delta: Vec2,
}

impl InputState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_key_down(&mut self, key: KeyCode) {
        if self.keys.insert(key) {
            self.pressed.extend(pressed_binding(key));
        }
    }

    pub fn set_key_up(&mut self, key: KeyCode) {
        self.keys.remove(&key);
    }

    pub fn is_key_down(&self, key: KeyCode) -> bool {
        self.keys.contains(&key)
    }

    /// Records the cursor position. The first event only sets the reference
    /// point so the view does not jump when the cursor enters the window.
    pub fn set_mouse_position(&mut self, position: Vec2) {
        if let Some(last) = self.last_cursor {
            let offset = position - last;
            // window y grows downwards
            self.mouse_delta += Vec2::new(offset.x, -offset.y);
        }
        self.last_cursor = Some(position);
    }

    /// Commands for the next frame: press events first, then the held keys,
    /// then accumulated mouse motion.
    pub fn drain_commands(&mut self) -> Vec<InputCommand> {
        let mut commands = std::mem::take(&mut self.pressed);
        commands.extend(
            HELD_BINDINGS
                .iter()
                .filter(|(key, _)| self.keys.contains(key))
                .map(|(_, command)| *command),
        );
        let delta = std::mem::take(&mut self.mouse_delta);
        if delta != Vec2::ZERO {
            commands.push(InputCommand::RotateCamera {
                dx: delta.x,
                dy: delta.y,
            });
        }
        commands
    }
}
