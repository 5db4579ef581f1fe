//! Script-declared GUI controls.
//!
//! Scripts declare the controls they want every frame; the host renders the
//! returned descriptors and writes edited values back into the persisted
//! [`GuiStore`]. A control's current value is whatever the store holds, the
//! declared initial otherwise.

use std::collections::HashMap;

use crate::foundation::color::Color;

/// Control flavor, also the id prefix (`"{kind}-{label}"`).
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GuiControlKind {
    Slider,
    Color,
    Checkbox,
    Button,
}

impl GuiControlKind {
    fn prefix(self) -> &'static str {
        match self {
            Self::Slider => "slider",
            Self::Color => "color",
            Self::Checkbox => "checkbox",
            Self::Button => "button",
        }
    }

    /// The store id for a control of this kind labelled `label`.
    pub fn id(self, label: &str) -> String {
        format!("{}-{}", self.prefix(), label)
    }
}

/// A host-editable control value.
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(untagged)]
pub enum GuiValue {
    Number(f64),
    Color(Color),
    Bool(bool),
}

/// Descriptor of one control as declared this frame.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct GuiControl {
    pub id: String,
    pub label: String,
    pub kind: GuiControlKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
    pub value: GuiValue,
}

/// Persisted control values, written by the host, read by scripts.
#[derive(Clone, Debug, Default)]
pub struct GuiStore {
    values: HashMap<String, GuiValue>,
}

impl GuiStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Host-side write of an edited value.
    pub fn set(&mut self, id: impl Into<String>, value: GuiValue) {
        self.values.insert(id.into(), value);
    }

    pub fn get(&self, id: &str) -> Option<&GuiValue> {
        self.values.get(id)
    }

    /// Slider read; the stored number when present, `initial` otherwise.
    pub fn slider_value(&self, label: &str, initial: f64) -> f64 {
        match self.values.get(&GuiControlKind::Slider.id(label)) {
            Some(GuiValue::Number(v)) => *v,
            _ => initial,
        }
    }

    /// Color read.
    pub fn color_value(&self, label: &str, initial: Color) -> Color {
        match self.values.get(&GuiControlKind::Color.id(label)) {
            Some(GuiValue::Color(c)) => *c,
            _ => initial,
        }
    }

    /// Checkbox read.
    pub fn checkbox_value(&self, label: &str, initial: bool) -> bool {
        match self.values.get(&GuiControlKind::Checkbox.id(label)) {
            Some(GuiValue::Bool(v)) => *v,
            _ => initial,
        }
    }

    /// Button read. True at most once per press: a pressed button resets to
    /// false as soon as a script observes it.
    pub fn take_button(&mut self, label: &str) -> bool {
        let id = GuiControlKind::Button.id(label);
        match self.values.get_mut(&id) {
            Some(GuiValue::Bool(pressed)) if *pressed => {
                *pressed = false;
                true
            }
            _ => false,
        }
    }
}

/// Builds the declared-controls list for one frame.
#[derive(Debug, Default)]
pub struct GuiFrame {
    controls: Vec<GuiControl>,
}

impl GuiFrame {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a slider and read its current value.
    pub fn slider(&mut self, store: &GuiStore, label: &str, min: f64, max: f64, initial: f64) -> f64 {
        self.controls.push(GuiControl {
            id: GuiControlKind::Slider.id(label),
            label: label.to_owned(),
            kind: GuiControlKind::Slider,
            min: Some(min),
            max: Some(max),
            value: GuiValue::Number(initial),
        });
        store.slider_value(label, initial)
    }

    /// Declare a color picker and read its current value.
    pub fn color(&mut self, store: &GuiStore, label: &str, initial: Color) -> Color {
        self.controls.push(GuiControl {
            id: GuiControlKind::Color.id(label),
            label: label.to_owned(),
            kind: GuiControlKind::Color,
            min: None,
            max: None,
            value: GuiValue::Color(initial),
        });
        store.color_value(label, initial)
    }

    /// Declare a checkbox and read its current value.
    pub fn checkbox(&mut self, store: &GuiStore, label: &str, initial: bool) -> bool {
        self.controls.push(GuiControl {
            id: GuiControlKind::Checkbox.id(label),
            label: label.to_owned(),
            kind: GuiControlKind::Checkbox,
            min: None,
            max: None,
            value: GuiValue::Bool(initial),
        });
        store.checkbox_value(label, initial)
    }

    /// Declare a button; true on the first read after a press.
    pub fn button(&mut self, store: &mut GuiStore, label: &str) -> bool {
        self.controls.push(GuiControl {
            id: GuiControlKind::Button.id(label),
            label: label.to_owned(),
            kind: GuiControlKind::Button,
            min: None,
            max: None,
            value: GuiValue::Bool(false),
        });
        store.take_button(label)
    }

    /// Controls declared so far this frame, in call order.
    pub fn into_controls(self) -> Vec<GuiControl> {
        self.controls
    }
}
