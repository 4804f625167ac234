//! Named, typed, directional argument lists.
//!
//! A [`VOption`] collects the arguments for one call of an operation:
//!
//! ```no_run
//! use vimage::{VImage, VOption};
//!
//! # fn main() -> vimage::Result<()> {
//! let image = VImage::black(64, 64, None)?;
//! let mut out = VImage::default();
//! let mut mean = 0.0;
//! VImage::call("invert", Some(VOption::new().set("in", &image).set_output("out", &mut out)))?;
//! VImage::call("avg", Some(VOption::new().set("in", &out).set_output("out", &mut mean)))?;
//! assert_eq!(mean, 255.0);
//! # Ok(())
//! # }
//! ```
//!
//! Inputs carry a [`Value`]; outputs carry an [`OutputSlot`] borrowing
//! storage the caller owns, so the borrow checker guarantees the storage
//! lives until the call returns. Each pair records its [`ArgDirection`]
//! when it is inserted and that decides whether invocation reads from it or
//! writes to it.

use crate::error::{Error, Result};
use crate::image::VImage;
use crate::operation::{ArgDirection, OperationInstance};
use crate::value::{Blob, Value, ValueType};

/// Caller-owned storage an output is written into after the operation runs.
#[derive(Debug)]
pub enum OutputSlot<'a> {
    Bool(&'a mut bool),
    Int(&'a mut i32),
    Double(&'a mut f64),
    String(&'a mut String),
    Image(&'a mut VImage),
    ArrayInt(&'a mut Vec<i32>),
    ArrayDouble(&'a mut Vec<f64>),
    ArrayImage(&'a mut Vec<VImage>),
    Blob(&'a mut Blob),
}

impl OutputSlot<'_> {
    /// The value type this slot can receive.
    pub fn value_type(&self) -> ValueType {
        match self {
            OutputSlot::Bool(_) => ValueType::Bool,
            OutputSlot::Int(_) => ValueType::Int,
            OutputSlot::Double(_) => ValueType::Double,
            OutputSlot::String(_) => ValueType::String,
            OutputSlot::Image(_) => ValueType::Image,
            OutputSlot::ArrayInt(_) => ValueType::ArrayInt,
            OutputSlot::ArrayDouble(_) => ValueType::ArrayDouble,
            OutputSlot::ArrayImage(_) => ValueType::ArrayImage,
            OutputSlot::Blob(_) => ValueType::Blob,
        }
    }

    /// Whether [`write`](Self::write) would take `value`.
    fn accepts(&self, value: &Value) -> bool {
        matches!(
            (self, value),
            (OutputSlot::Bool(_), Value::Bool(_))
                | (OutputSlot::Int(_), Value::Int(_) | Value::Enum(_))
                | (OutputSlot::Double(_), Value::Double(_) | Value::Int(_))
                | (OutputSlot::String(_), Value::String(_))
                | (OutputSlot::Image(_), Value::Image(_))
                | (OutputSlot::ArrayInt(_), Value::ArrayInt(_))
                | (OutputSlot::ArrayDouble(_), Value::ArrayDouble(_))
                | (OutputSlot::ArrayImage(_), Value::ArrayImage(_))
                | (OutputSlot::Blob(_), Value::Blob(_))
        )
    }

    /// Store `value`, returning it back if its kind doesn't fit this slot.
    ///
    /// Array outputs replace the caller's vector wholesale. An int result
    /// may land in a double slot; an enum result lands in an int slot as its
    /// integer value.
    fn write(&mut self, value: Value) -> std::result::Result<(), Value> {
        match (self, value) {
            (OutputSlot::Bool(slot), Value::Bool(v)) => **slot = v,
            (OutputSlot::Int(slot), Value::Int(v)) => **slot = v,
            (OutputSlot::Int(slot), Value::Enum(e)) => **slot = e.value,
            (OutputSlot::Double(slot), Value::Double(v)) => **slot = v,
            (OutputSlot::Double(slot), Value::Int(v)) => **slot = v as f64,
            (OutputSlot::String(slot), Value::String(v)) => **slot = v,
            (OutputSlot::Image(slot), Value::Image(v)) => **slot = v,
            (OutputSlot::ArrayInt(slot), Value::ArrayInt(v)) => **slot = v,
            (OutputSlot::ArrayDouble(slot), Value::ArrayDouble(v)) => **slot = v,
            (OutputSlot::ArrayImage(slot), Value::ArrayImage(v)) => **slot = v,
            (OutputSlot::Blob(slot), Value::Blob(v)) => **slot = v,
            (_, other) => return Err(other),
        }
        Ok(())
    }
}

impl<'a> From<&'a mut bool> for OutputSlot<'a> {
    fn from(v: &'a mut bool) -> Self {
        OutputSlot::Bool(v)
    }
}

impl<'a> From<&'a mut i32> for OutputSlot<'a> {
    fn from(v: &'a mut i32) -> Self {
        OutputSlot::Int(v)
    }
}

impl<'a> From<&'a mut f64> for OutputSlot<'a> {
    fn from(v: &'a mut f64) -> Self {
        OutputSlot::Double(v)
    }
}

impl<'a> From<&'a mut String> for OutputSlot<'a> {
    fn from(v: &'a mut String) -> Self {
        OutputSlot::String(v)
    }
}

impl<'a> From<&'a mut VImage> for OutputSlot<'a> {
    fn from(v: &'a mut VImage) -> Self {
        OutputSlot::Image(v)
    }
}

impl<'a> From<&'a mut Vec<i32>> for OutputSlot<'a> {
    fn from(v: &'a mut Vec<i32>) -> Self {
        OutputSlot::ArrayInt(v)
    }
}

impl<'a> From<&'a mut Vec<f64>> for OutputSlot<'a> {
    fn from(v: &'a mut Vec<f64>) -> Self {
        OutputSlot::ArrayDouble(v)
    }
}

impl<'a> From<&'a mut Vec<VImage>> for OutputSlot<'a> {
    fn from(v: &'a mut Vec<VImage>) -> Self {
        OutputSlot::ArrayImage(v)
    }
}

impl<'a> From<&'a mut Blob> for OutputSlot<'a> {
    fn from(v: &'a mut Blob) -> Self {
        OutputSlot::Blob(v)
    }
}

/// One argument: an input value or an output slot.
#[derive(Debug)]
pub enum Argument<'a> {
    Input(Value),
    Output(OutputSlot<'a>),
}

impl Argument<'_> {
    pub fn direction(&self) -> ArgDirection {
        match self {
            Argument::Input(_) => ArgDirection::Input,
            Argument::Output(_) => ArgDirection::Output,
        }
    }
}

#[derive(Debug)]
struct Pair<'a> {
    name: String,
    argument: Argument<'a>,
}

/// An ordered argument list for a single operation call.
#[derive(Debug, Default)]
pub struct VOption<'a> {
    pairs: Vec<Pair<'a>>,
}

impl<'a> VOption<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an argument with an explicit direction.
    pub fn push(&mut self, name: &str, argument: Argument<'a>) -> &mut Self {
        self.pairs.push(Pair {
            name: name.to_string(),
            argument,
        });
        self
    }

    /// Add an input argument.
    pub fn set(mut self, name: &str, value: impl Into<Value>) -> Self {
        self.push(name, Argument::Input(value.into()));
        self
    }

    /// Register caller storage to receive an output argument.
    pub fn set_output(mut self, name: &str, slot: impl Into<OutputSlot<'a>>) -> Self {
        self.push(name, Argument::Output(slot.into()));
        self
    }

    /// Append every pair of `other` after the existing ones.
    pub fn extend(mut self, other: VOption<'a>) -> Self {
        self.pairs.extend(other.pairs);
        self
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    /// Argument names and directions in insertion order.
    pub fn names(&self) -> impl Iterator<Item = (&str, ArgDirection)> {
        self.pairs
            .iter()
            .map(|p| (p.name.as_str(), p.argument.direction()))
    }

    /// Move every input into the operation's properties, in insertion order.
    ///
    /// Returns the remaining output pairs, to be filled by
    /// [`PendingOutputs::apply`] once the operation has been built.
    pub fn apply_inputs(self, instance: &mut OperationInstance) -> Result<PendingOutputs<'a>> {
        let mut outputs = Vec::new();
        for Pair { name, argument } in self.pairs {
            match argument {
                Argument::Input(value) => {
                    tracing::trace!(operation = instance.name(), argument = %name, value = %value, "set input");
                    instance.set_property(&name, value)?;
                }
                Argument::Output(slot) => {
                    instance.output_spec(&name)?;
                    outputs.push((name, slot));
                }
            }
        }
        Ok(PendingOutputs { outputs })
    }
}

/// Output slots waiting for an operation to finish.
#[derive(Debug)]
pub struct PendingOutputs<'a> {
    outputs: Vec<(String, OutputSlot<'a>)>,
}

impl PendingOutputs<'_> {
    /// Copy each requested output out of a built operation into caller storage.
    ///
    /// Every output is read and checked against its slot first; nothing is
    /// written unless all of them fit.
    pub fn apply(self, instance: &OperationInstance) -> Result<()> {
        let mismatch = |name: &str, expected: ValueType, found: &Value| Error::ArgumentType {
            operation: instance.name().to_string(),
            argument: name.to_string(),
            expected,
            found: found.value_type(),
        };

        let mut ready = Vec::with_capacity(self.outputs.len());
        for (name, slot) in self.outputs {
            let value = instance.get_property(&name)?.clone();
            tracing::trace!(operation = instance.name(), argument = %name, value = %value, "read output");
            if !slot.accepts(&value) {
                return Err(mismatch(&name, slot.value_type(), &value));
            }
            ready.push((name, slot, value));
        }

        for (name, mut slot, value) in ready {
            let expected = slot.value_type();
            slot.write(value)
                .map_err(|rejected| mismatch(&name, expected, &rejected))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::operation::tests::RecordingOperation;
    use std::sync::Arc;

    fn recording() -> OperationInstance {
        OperationInstance::new(Arc::new(RecordingOperation::new()))
    }

    #[test]
    fn pairs_keep_insertion_order_and_direction() {
        let mut out = 0.0;
        let options = VOption::new()
            .set("b", 1)
            .set_output("out", &mut out)
            .set("a", true);
        let names: Vec<_> = options.names().collect();
        assert_eq!(
            names,
            [
                ("b", ArgDirection::Input),
                ("out", ArgDirection::Output),
                ("a", ArgDirection::Input)
            ]
        );
    }

    #[test]
    fn explicit_push_direction() {
        let mut out = 0.0;
        let mut options = VOption::new();
        options
            .push("value", Argument::Input(Value::Double(2.0)))
            .push("out", Argument::Output(OutputSlot::Double(&mut out)));
        let mut instance = recording();
        let pending = options.apply_inputs(&mut instance).unwrap();
        instance.build().unwrap();
        pending.apply(&instance).unwrap();
        assert_eq!(out, 4.0);
    }

    #[test]
    fn inputs_applied_then_outputs_written_back() {
        let mut out = 0.0;
        let mut instance = recording();
        let pending = VOption::new()
            .set("value", 1.5)
            .set("offset", 1)
            .set_output("out", &mut out)
            .apply_inputs(&mut instance)
            .unwrap();
        instance.build().unwrap();
        pending.apply(&instance).unwrap();
        assert_eq!(out, 4.0);
    }

    #[test]
    fn mismatched_output_slot_is_an_error() {
        let mut wrong = VImage::default();
        let mut instance = recording();
        let pending = VOption::new()
            .set("value", 1.0)
            .set_output("out", &mut wrong)
            .apply_inputs(&mut instance)
            .unwrap();
        instance.build().unwrap();
        let err = pending.apply(&instance).unwrap_err();
        assert!(matches!(
            err,
            Error::ArgumentType {
                expected: ValueType::Image,
                found: ValueType::Double,
                ..
            }
        ));
        assert!(wrong.is_null());
    }

    #[test]
    fn later_slot_mismatch_leaves_earlier_slots_untouched() {
        let image = crate::test_helpers::gradient(3, 3, 1);
        for name in ["min", "max"] {
            let mut value = -1.0;
            let mut x = String::from("unset");
            let err = crate::call::call(
                name,
                Some(
                    VOption::new()
                        .set("in", &image)
                        .set_output("out", &mut value)
                        .set_output("x", &mut x),
                ),
            )
            .unwrap_err();
            assert!(matches!(err, Error::ArgumentType { .. }), "{name}: {err}");
            assert_eq!(value, -1.0, "{name}");
            assert_eq!(x, "unset", "{name}");
        }
    }

    #[test]
    fn output_registered_for_an_input_property_is_rejected() {
        let mut slot = 0.0;
        let mut instance = recording();
        let err = VOption::new()
            .set_output("value", &mut slot)
            .apply_inputs(&mut instance)
            .unwrap_err();
        assert!(matches!(err, Error::ArgumentDirection { .. }));
    }

    #[test]
    fn array_output_replaces_caller_vector() {
        let mut slot = vec![9.0; 5];
        OutputSlot::from(&mut slot)
            .write(Value::ArrayDouble(vec![1.0, 2.0]))
            .unwrap();
        assert_eq!(slot, vec![1.0, 2.0]);
    }

    #[test]
    fn extend_appends_caller_options() {
        let base = VOption::new().set("in", 1);
        let merged = base.extend(VOption::new().set("extra", 2.0));
        assert_eq!(merged.len(), 2);
    }
}
