//! Debug panel: named, range-bounded controls bound to live scene values.
//!
//! The panel only describes controls. Writing a value goes through
//! [`crate::AppContext::set_control`], which owns the targets.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{scene::NodeId, Result, SceneError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Axis {
    X,
    Y,
    Z,
}

/// Field a control writes through to.
#[derive(Debug, Clone, PartialEq)]
pub enum ParamTarget {
    /// `rotation.y` of a node.
    NodeRotationY(NodeId),
    EnvMapIntensity,
    LightIntensity(NodeId),
    LightPosition(NodeId, Axis),
    /// One component of a vec2 uniform on the shader material of `node`.
    UniformVec2 {
        node: NodeId,
        uniform: &'static str,
        axis: Axis,
    },
    ToneMapping,
    ToneMappingExposure,
}

/// Work that must run synchronously after a control changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeHook {
    /// Re-run material normalization with the new values.
    RefreshMaterials,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ControlKind {
    Slider { min: f64, max: f64, step: f64 },
    Choice { options: Vec<(String, f64)> },
}

impl ControlKind {
    /// Snaps a slider value to its step and clamps it to range; checks that a
    /// choice value is one of the options.
    pub fn sanitize(&self, control: &str, value: f64) -> Result<f64> {
        if !value.is_finite() {
            return Err(SceneError::msg(format!("control `{control}` needs a finite value")));
        }

        match self {
            ControlKind::Slider { min, max, step } => {
                let snapped = if *step > 0.0 {
                    (value / step).round() * step
                } else {
                    value
                };
                Ok(snapped.clamp(*min, *max))
            }
            ControlKind::Choice { options } => options
                .iter()
                .find(|(_, option)| *option == value)
                .map(|(_, option)| *option)
                .ok_or_else(|| SceneError::InvalidChoice {
                    control: control.to_string(),
                    value,
                }),
        }
    }

    /// Option value for a dropdown label.
    pub fn option(&self, label: &str) -> Option<f64> {
        match self {
            ControlKind::Choice { options } => options
                .iter()
                .find(|(name, _)| name == label)
                .map(|(_, value)| *value),
            ControlKind::Slider { .. } => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Control {
    pub name: String,
    pub target: ParamTarget,
    pub kind: ControlKind,
    pub on_change: Option<ChangeHook>,
}

impl Control {
    pub fn slider(name: &str, target: ParamTarget, min: f64, max: f64, step: f64) -> Self {
        Self {
            name: name.to_string(),
            target,
            kind: ControlKind::Slider { min, max, step },
            on_change: None,
        }
    }

    pub fn choice<I, S>(name: &str, target: ParamTarget, options: I) -> Self
    where
        I: IntoIterator<Item = (S, f64)>,
        S: Into<String>,
    {
        Self {
            name: name.to_string(),
            target,
            kind: ControlKind::Choice {
                options: options.into_iter().map(|(label, value)| (label.into(), value)).collect(),
            },
            on_change: None,
        }
    }

    pub fn on_change(mut self, hook: ChangeHook) -> Self {
        self.on_change = Some(hook);
        self
    }
}

impl fmt::Display for Control {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            ControlKind::Slider { min, max, step } => {
                write!(f, "{:<20} slider [{min}, {max}] step {step}", self.name)?
            }
            ControlKind::Choice { options } => {
                let labels: Vec<&str> = options.iter().map(|(label, _)| label.as_str()).collect();
                write!(f, "{:<20} choice {{{}}}", self.name, labels.join(", "))?
            }
        }
        if self.on_change.is_some() {
            f.write_str(" (refreshes materials)")?;
        }
        Ok(())
    }
}

/// Ordered registry of controls, keyed by name.
#[derive(Debug, Default, Clone)]
pub struct ControlPanel {
    controls: Vec<Control>,
}

impl ControlPanel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `control`. A control with the same name is replaced in place.
    pub fn add(&mut self, control: Control) {
        match self.controls.iter_mut().find(|existing| existing.name == control.name) {
            Some(existing) => {
                tracing::warn!(name = %control.name, "replacing existing control");
                *existing = control;
            }
            None => {
                tracing::debug!(name = %control.name, "registered control");
                self.controls.push(control);
            }
        }
    }

    pub fn get(&self, name: &str) -> Option<&Control> {
        self.controls.iter().find(|control| control.name == name)
    }

    pub fn controls(&self) -> &[Control] {
        &self.controls
    }

    pub fn len(&self) -> usize {
        self.controls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.controls.is_empty()
    }

    /// One line per control, in registration order.
    pub fn describe(&self) -> Vec<String> {
        self.controls.iter().map(Control::to_string).collect()
    }
}

/// A value written to a named control, as a user would through the panel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterUpdate {
    pub target: String,
    pub value: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sliders_snap_then_clamp() {
        let kind = ControlKind::Slider {
            min: 0.0,
            max: 10.0,
            step: 0.001,
        };

        assert!((kind.sanitize("x", 2.50049).unwrap() - 2.5).abs() < 1e-9);
        assert_eq!(kind.sanitize("x", 42.0).unwrap(), 10.0);
        assert_eq!(kind.sanitize("x", -1.0).unwrap(), 0.0);
        assert!(kind.sanitize("x", f64::NAN).is_err());
    }

    #[test]
    fn choices_accept_only_their_options() {
        let control = Control::choice(
            "toneMapping",
            ParamTarget::ToneMapping,
            [("No", 0.0), ("Linear", 1.0)],
        );

        assert_eq!(control.kind.sanitize("toneMapping", 1.0).unwrap(), 1.0);
        assert!(matches!(
            control.kind.sanitize("toneMapping", 3.0),
            Err(SceneError::InvalidChoice { .. })
        ));
        assert_eq!(control.kind.option("Linear"), Some(1.0));
        assert_eq!(control.kind.option("Cineon"), None);
    }

    #[test]
    fn same_name_replaces_in_place() {
        let mut panel = ControlPanel::new();
        panel.add(Control::slider("a", ParamTarget::EnvMapIntensity, 0.0, 1.0, 0.1));
        panel.add(Control::slider("b", ParamTarget::ToneMappingExposure, 0.0, 1.0, 0.1));
        panel.add(
            Control::slider("a", ParamTarget::EnvMapIntensity, 0.0, 5.0, 0.1)
                .on_change(ChangeHook::RefreshMaterials),
        );

        assert_eq!(panel.len(), 2);
        assert_eq!(panel.controls()[0].name, "a");
        assert_eq!(panel.get("a").unwrap().on_change, Some(ChangeHook::RefreshMaterials));
        assert!(panel.describe()[0].contains("refreshes materials"));
    }
}
