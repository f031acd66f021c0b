//! Keyboard bindings for the preview window.
//!
//! Controls are a thin layer over [`effects::ParameterValues`]: they name a
//! parameter by key and never touch GPU state directly.

use effects::{EffectDescriptor, EffectId};
use winit::keyboard::{Key, NamedKey};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    SelectEffect(EffectId),
    NextParam,
    PreviousParam,
    /// Nudge the selected parameter by one step; booleans toggle.
    Step(i32),
    ReloadShader,
    ClearShader,
    Snapshot,
    Close,
}

/// Maps a pressed key to an action. `shift` reverses Tab.
pub fn action_for(key: &Key, shift: bool) -> Option<Action> {
    match key {
        Key::Named(NamedKey::Tab) if shift => Some(Action::PreviousParam),
        Key::Named(NamedKey::Tab) => Some(Action::NextParam),
        Key::Named(NamedKey::ArrowUp) => Some(Action::Step(1)),
        Key::Named(NamedKey::ArrowDown) => Some(Action::Step(-1)),
        Key::Named(NamedKey::Backspace) => Some(Action::ClearShader),
        Key::Named(NamedKey::Escape) => Some(Action::Close),
        Key::Character(text) => {
            let mut chars = text.chars();
            let (Some(ch), None) = (chars.next(), chars.next()) else {
                return None;
            };
            match ch.to_ascii_lowercase() {
                'r' => Some(Action::ReloadShader),
                's' => Some(Action::Snapshot),
                digit @ '1'..='9' => {
                    let index = digit as usize - '1' as usize;
                    EffectId::from_index(index).map(Action::SelectEffect)
                }
                _ => None,
            }
        }
        _ => None,
    }
}

/// Which parameter of the current effect the arrow keys edit.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ParamCursor {
    index: usize,
}

impl ParamCursor {
    pub fn reset(&mut self) {
        self.index = 0;
    }

    /// Moves by `delta`, wrapping around the effect's parameter list.
    pub fn advance(&mut self, descriptor: &EffectDescriptor, delta: isize) {
        let len = descriptor.params.len();
        if len == 0 {
            self.index = 0;
            return;
        }
        let current = (self.index % len) as isize;
        self.index = (current + delta).rem_euclid(len as isize) as usize;
    }

    pub fn key(&self, descriptor: &EffectDescriptor) -> Option<&'static str> {
        descriptor.params.get(self.index).map(|def| def.key)
    }
}
