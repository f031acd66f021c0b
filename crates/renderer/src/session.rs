//! User-facing session state and change notifications.
//!
//! `SessionState` holds what the user picked (effect, parameter values,
//! shader override) and nothing GPU related. The orchestrator owns one and
//! is the only writer; UI code subscribes to [`SessionEvent`]s.

use crossbeam_channel::{unbounded, Receiver, Sender};
use effects::{EffectId, ParamError, ParamValue, ParameterValues};

/// Lifecycle phase of the render orchestrator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Uninitialized,
    Initializing,
    Ready,
    Rebuilding,
    Error,
    TornDown,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    EffectChanged(EffectId),
    ParameterChanged { key: String, value: ParamValue },
    ShaderOverrideChanged { active: bool },
    ImageChanged { width: u32, height: u32 },
    ImageError(String),
    PhaseChanged(Phase),
    /// `Some` carries a compiler diagnostic; `None` clears a previous one.
    ShaderError(Option<String>),
}

#[derive(Debug)]
pub struct SessionState {
    params: ParameterValues,
    shader_override: Option<String>,
    subscribers: Vec<Sender<SessionEvent>>,
}

impl SessionState {
    pub fn new(effect: EffectId) -> Self {
        Self {
            params: effect.descriptor().defaults(),
            shader_override: None,
            subscribers: Vec::new(),
        }
    }

    pub fn effect(&self) -> EffectId {
        self.params.effect()
    }

    pub fn params(&self) -> &ParameterValues {
        &self.params
    }

    pub fn shader_override(&self) -> Option<&str> {
        self.shader_override.as_deref()
    }

    /// Source the next pipeline build should compile.
    pub fn shader_source(&self) -> &str {
        self.shader_override
            .as_deref()
            .unwrap_or(self.effect().descriptor().shader_source)
    }

    pub fn subscribe(&mut self) -> Receiver<SessionEvent> {
        let (tx, rx) = unbounded();
        self.subscribers.push(tx);
        rx
    }

    /// Switches effect and resets every parameter to its default.
    ///
    /// Returns `false` when `effect` is already selected.
    pub(crate) fn select_effect(&mut self, effect: EffectId) -> bool {
        if effect == self.effect() {
            return false;
        }
        self.params = effect.descriptor().defaults();
        self.emit(SessionEvent::EffectChanged(effect));
        true
    }

    pub(crate) fn set_param(
        &mut self,
        key: &str,
        value: ParamValue,
    ) -> Result<ParamValue, ParamError> {
        let stored = self.params.set(key, value)?;
        Ok(self.param_changed(key, stored))
    }

    pub(crate) fn set_param_from_str(
        &mut self,
        key: &str,
        text: &str,
    ) -> Result<ParamValue, ParamError> {
        let stored = self.params.set_from_str(key, text)?;
        Ok(self.param_changed(key, stored))
    }

    pub(crate) fn step_param(
        &mut self,
        key: &str,
        direction: i32,
    ) -> Result<ParamValue, ParamError> {
        let stored = self.params.step(key, direction)?;
        Ok(self.param_changed(key, stored))
    }

    fn param_changed(&mut self, key: &str, value: ParamValue) -> ParamValue {
        self.emit(SessionEvent::ParameterChanged {
            key: key.to_string(),
            value,
        });
        value
    }

    /// Returns `false` when the override is unchanged.
    pub(crate) fn set_shader_override(&mut self, source: Option<String>) -> bool {
        if self.shader_override == source {
            return false;
        }
        self.shader_override = source;
        let active = self.shader_override.is_some();
        self.emit(SessionEvent::ShaderOverrideChanged { active });
        true
    }

    pub(crate) fn emit(&mut self, event: SessionEvent) {
        self.subscribers
            .retain(|subscriber| subscriber.send(event.clone()).is_ok());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn switching_effect_resets_parameters_to_defaults() {
        let mut session = SessionState::new(EffectId::Halftone);
        session.set_param("angle", ParamValue::Number(10.0)).unwrap();
        assert!(session.select_effect(EffectId::Mirror));
        assert_eq!(session.params(), &EffectId::Mirror.descriptor().defaults());
        assert!(session.select_effect(EffectId::Halftone));
        assert_eq!(session.params().get("angle"), Some(ParamValue::Number(45.0)));
    }

    #[test]
    fn reselecting_the_same_effect_keeps_edits() {
        let mut session = SessionState::new(EffectId::Halftone);
        session.set_param("angle", ParamValue::Number(10.0)).unwrap();
        assert!(!session.select_effect(EffectId::Halftone));
        assert_eq!(session.params().get("angle"), Some(ParamValue::Number(10.0)));
    }

    #[test]
    fn override_takes_precedence_over_catalog_source() {
        let mut session = SessionState::new(EffectId::Pixelate);
        assert_eq!(
            session.shader_source(),
            EffectId::Pixelate.descriptor().shader_source
        );
        assert!(session.set_shader_override(Some("custom".into())));
        assert_eq!(session.shader_source(), "custom");
        assert!(!session.set_shader_override(Some("custom".into())));
        assert!(session.set_shader_override(None));
        assert_eq!(
            session.shader_source(),
            EffectId::Pixelate.descriptor().shader_source
        );
    }

    #[test]
    fn subscribers_receive_events_and_dropped_ones_are_pruned() {
        let mut session = SessionState::new(EffectId::Halftone);
        let events = session.subscribe();
        let dropped = session.subscribe();
        drop(dropped);

        session.select_effect(EffectId::Glass);
        session
            .set_param("bumpiness", ParamValue::Number(2.0))
            .unwrap();

        assert_eq!(
            events.try_iter().collect::<Vec<_>>(),
            vec![
                SessionEvent::EffectChanged(EffectId::Glass),
                SessionEvent::ParameterChanged {
                    key: "bumpiness".into(),
                    value: ParamValue::Number(2.0),
                },
            ]
        );
        assert_eq!(session.subscribers.len(), 1);
    }
}
