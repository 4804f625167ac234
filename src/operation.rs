//! The operation seam.
//!
//! Everything that touches pixels lives behind the [`Operation`] trait. An
//! operation declares its properties as a list of [`ArgSpec`]s (name, type,
//! direction, whether it is required, numeric range, default) and does its
//! work in [`Operation::build`], reading inputs from and writing outputs to
//! an [`Arguments`] bag.
//!
//! [`OperationInstance`] is one run of one operation. It is the only thing
//! the invocation layer talks to: it type-checks every property assignment
//! against the declaration, fills in defaults, makes sure required inputs
//! are present before building and required outputs are present after.

use crate::connection::{VSource, VTarget};
use crate::enums::EnumType;
use crate::error::{Error, Result};
use crate::image::VImage;
use crate::interpolate::VInterpolate;
use crate::value::{Blob, Value, ValueType};
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;

/// Failure inside an operation's `build`.
#[derive(Error, Debug)]
pub enum OperationError {
    #[error("{0}")]
    Failed(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Codec error: {0}")]
    Codec(#[from] image::ImageError),
    #[error("argument \"{name}\": {reason}")]
    Argument { name: String, reason: String },
    #[error("image is {width}x{height}, over the {limit} pixel limit")]
    TooLarge { width: u32, height: u32, limit: u64 },
    #[error(transparent)]
    Nested(#[from] Error),
}

impl OperationError {
    pub fn argument(name: &str, reason: impl Into<String>) -> Self {
        OperationError::Argument {
            name: name.to_string(),
            reason: reason.into(),
        }
    }
}

/// Whether a property is read by the operation or written by it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArgDirection {
    Input,
    Output,
}

impl ArgDirection {
    pub fn as_str(self) -> &'static str {
        match self {
            ArgDirection::Input => "input",
            ArgDirection::Output => "output",
        }
    }
}

/// Declaration of one operation property.
#[derive(Debug, Clone)]
pub struct ArgSpec {
    pub name: &'static str,
    pub description: &'static str,
    pub value_type: ValueType,
    pub direction: ArgDirection,
    pub required: bool,
    /// Inclusive bounds for numeric scalars and each element of numeric arrays.
    pub range: Option<(f64, f64)>,
    /// Applied to optional inputs the caller left unset.
    pub default: Option<Value>,
}

impl ArgSpec {
    /// A required input.
    pub fn input(name: &'static str, description: &'static str, value_type: ValueType) -> Self {
        Self {
            name,
            description,
            value_type,
            direction: ArgDirection::Input,
            required: true,
            range: None,
            default: None,
        }
    }

    /// A required output.
    pub fn output(name: &'static str, description: &'static str, value_type: ValueType) -> Self {
        Self {
            direction: ArgDirection::Output,
            ..Self::input(name, description, value_type)
        }
    }

    pub fn optional(mut self) -> Self {
        self.required = false;
        self
    }

    pub fn range(mut self, min: f64, max: f64) -> Self {
        self.range = Some((min, max));
        self
    }

    /// Make the argument optional with a default.
    pub fn default_value(mut self, value: impl Into<Value>) -> Self {
        self.required = false;
        self.default = Some(value.into());
        self
    }

    pub fn is_input(&self) -> bool {
        self.direction == ArgDirection::Input
    }
}

/// An image operation, looked up by name in the [`Registry`](crate::Registry).
pub trait Operation: Send + Sync {
    fn name(&self) -> &str;

    fn description(&self) -> &str;

    /// Property declarations, required arguments first in positional order.
    fn args(&self) -> &[ArgSpec];

    /// Run the operation. Every required input is present and every optional
    /// input with a default has been filled in.
    fn build(&self, args: &mut Arguments) -> std::result::Result<(), OperationError>;
}

/// Property values of one operation run.
#[derive(Debug, Default)]
pub struct Arguments {
    values: HashMap<String, Value>,
}

type OpResult<T> = std::result::Result<T, OperationError>;

impl Arguments {
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.values.get(name)
    }

    pub fn has(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    fn require(&self, name: &str) -> OpResult<&Value> {
        self.values
            .get(name)
            .ok_or_else(|| OperationError::argument(name, "not set"))
    }

    fn mismatch(name: &str, expected: ValueType, found: &Value) -> OperationError {
        OperationError::argument(name, format!("expected {expected}, got {}", found.value_type()))
    }

    pub fn image(&self, name: &str) -> OpResult<&VImage> {
        match self.require(name)? {
            Value::Image(image) => Ok(image),
            other => Err(Self::mismatch(name, ValueType::Image, other)),
        }
    }

    pub fn images(&self, name: &str) -> OpResult<&[VImage]> {
        match self.require(name)? {
            Value::ArrayImage(images) => Ok(images),
            other => Err(Self::mismatch(name, ValueType::ArrayImage, other)),
        }
    }

    pub fn bool(&self, name: &str) -> OpResult<bool> {
        match self.require(name)? {
            Value::Bool(b) => Ok(*b),
            other => Err(Self::mismatch(name, ValueType::Bool, other)),
        }
    }

    pub fn int(&self, name: &str) -> OpResult<i32> {
        match self.require(name)? {
            Value::Int(i) => Ok(*i),
            other => Err(Self::mismatch(name, ValueType::Int, other)),
        }
    }

    pub fn double(&self, name: &str) -> OpResult<f64> {
        match self.require(name)? {
            Value::Double(d) => Ok(*d),
            other => Err(Self::mismatch(name, ValueType::Double, other)),
        }
    }

    pub fn string(&self, name: &str) -> OpResult<&str> {
        match self.require(name)? {
            Value::String(s) => Ok(s),
            other => Err(Self::mismatch(name, ValueType::String, other)),
        }
    }

    pub fn array_int(&self, name: &str) -> OpResult<&[i32]> {
        match self.require(name)? {
            Value::ArrayInt(a) => Ok(a),
            other => Err(Self::mismatch(name, ValueType::ArrayInt, other)),
        }
    }

    pub fn array_double(&self, name: &str) -> OpResult<&[f64]> {
        match self.require(name)? {
            Value::ArrayDouble(a) => Ok(a),
            other => Err(Self::mismatch(name, ValueType::ArrayDouble, other)),
        }
    }

    pub fn blob(&self, name: &str) -> OpResult<&Blob> {
        match self.require(name)? {
            Value::Blob(blob) => Ok(blob),
            other => Err(Self::mismatch(name, ValueType::Blob, other)),
        }
    }

    pub fn enum_value<E: EnumType>(&self, name: &str) -> OpResult<E> {
        match self.require(name)? {
            Value::Enum(e) => e
                .get::<E>()
                .ok_or_else(|| OperationError::argument(name, format!("not a {}", E::TYPE_NAME))),
            other => Err(Self::mismatch(name, ValueType::Enum(E::spec()), other)),
        }
    }

    pub fn interpolate(&self, name: &str) -> OpResult<&VInterpolate> {
        match self.require(name)? {
            Value::Interpolate(i) => Ok(i),
            other => Err(Self::mismatch(name, ValueType::Interpolate, other)),
        }
    }

    pub fn source(&self, name: &str) -> OpResult<&VSource> {
        match self.require(name)? {
            Value::Source(s) => Ok(s),
            other => Err(Self::mismatch(name, ValueType::Source, other)),
        }
    }

    pub fn target(&self, name: &str) -> OpResult<&VTarget> {
        match self.require(name)? {
            Value::Target(t) => Ok(t),
            other => Err(Self::mismatch(name, ValueType::Target, other)),
        }
    }

    /// Record an output value.
    pub fn set_output(&mut self, name: &str, value: impl Into<Value>) {
        self.values.insert(name.to_string(), value.into());
    }
}

/// One run of one operation.
pub struct OperationInstance {
    operation: Arc<dyn Operation>,
    args: Arguments,
    built: bool,
}

impl OperationInstance {
    pub fn new(operation: Arc<dyn Operation>) -> Self {
        Self {
            operation,
            args: Arguments::default(),
            built: false,
        }
    }

    pub fn name(&self) -> &str {
        self.operation.name()
    }

    pub fn arg_spec(&self, name: &str) -> Option<&ArgSpec> {
        self.operation.args().iter().find(|a| a.name == name)
    }

    fn spec_or_err(&self, name: &str) -> Result<&ArgSpec> {
        self.arg_spec(name).ok_or_else(|| Error::UnknownArgument {
            operation: self.name().to_string(),
            argument: name.to_string(),
        })
    }

    /// Assign an input property, converting it to the declared type.
    pub fn set_property(&mut self, name: &str, value: Value) -> Result<()> {
        let operation = self.name().to_string();
        let spec = self.spec_or_err(name)?.clone();

        if spec.direction != ArgDirection::Input {
            return Err(Error::ArgumentDirection {
                operation,
                argument: name.to_string(),
                declared: spec.direction.as_str(),
                requested: ArgDirection::Input.as_str(),
            });
        }

        let found = value.value_type();
        let value = value.coerce(spec.value_type).ok_or_else(|| Error::ArgumentType {
            operation: operation.clone(),
            argument: name.to_string(),
            expected: spec.value_type,
            found,
        })?;

        check_not_null(&operation, name, &value)?;
        if let Some((min, max)) = spec.range {
            check_range(&operation, name, &value, min, max)?;
        }

        self.args.values.insert(name.to_string(), value);
        Ok(())
    }

    /// Read a property back. Outputs are only available after [`build`](Self::build).
    pub fn get_property(&self, name: &str) -> Result<&Value> {
        let spec = self.spec_or_err(name)?;
        self.args.get(name).ok_or_else(|| {
            if spec.is_input() {
                Error::MissingArgument {
                    operation: self.name().to_string(),
                    argument: name.to_string(),
                }
            } else {
                Error::MissingOutput {
                    operation: self.name().to_string(),
                    argument: name.to_string(),
                }
            }
        })
    }

    /// Check an output property exists and is declared as an output.
    pub fn output_spec(&self, name: &str) -> Result<&ArgSpec> {
        let spec = self.spec_or_err(name)?;
        if spec.direction != ArgDirection::Output {
            return Err(Error::ArgumentDirection {
                operation: self.name().to_string(),
                argument: name.to_string(),
                declared: spec.direction.as_str(),
                requested: ArgDirection::Output.as_str(),
            });
        }
        Ok(spec)
    }

    /// Fill defaults, check required inputs, run, check required outputs.
    pub fn build(&mut self) -> Result<()> {
        let operation = Arc::clone(&self.operation);
        let specs = operation.args();

        for spec in specs.iter().filter(|s| s.is_input()) {
            if self.args.has(spec.name) {
                continue;
            }
            match &spec.default {
                Some(default) => {
                    self.args.values.insert(spec.name.to_string(), default.clone());
                }
                None if spec.required => {
                    return Err(Error::MissingArgument {
                        operation: operation.name().to_string(),
                        argument: spec.name.to_string(),
                    });
                }
                None => {}
            }
        }

        operation
            .build(&mut self.args)
            .map_err(|e| Error::OperationFailed {
                operation: operation.name().to_string(),
                message: e.to_string(),
            })?;

        for spec in specs.iter().filter(|s| !s.is_input()) {
            match self.args.get(spec.name) {
                None if spec.required => {
                    return Err(Error::MissingOutput {
                        operation: operation.name().to_string(),
                        argument: spec.name.to_string(),
                    });
                }
                Some(value) if value.value_type() != spec.value_type => {
                    return Err(Error::OperationFailed {
                        operation: operation.name().to_string(),
                        message: format!(
                            "output \"{}\" produced {}, declared {}",
                            spec.name,
                            value.value_type(),
                            spec.value_type
                        ),
                    });
                }
                _ => {}
            }
        }

        self.built = true;
        Ok(())
    }

    pub fn is_built(&self) -> bool {
        self.built
    }
}

fn check_not_null(operation: &str, name: &str, value: &Value) -> Result<()> {
    let null = match value {
        Value::Image(image) => image.is_null(),
        Value::ArrayImage(images) => images.iter().any(VImage::is_null),
        Value::Interpolate(i) => i.is_null(),
        Value::Source(s) => s.is_null(),
        Value::Target(t) => t.is_null(),
        _ => false,
    };
    if null {
        return Err(Error::InvalidArgument {
            operation: operation.to_string(),
            argument: name.to_string(),
            reason: "null handle".to_string(),
        });
    }
    Ok(())
}

fn check_range(operation: &str, name: &str, value: &Value, min: f64, max: f64) -> Result<()> {
    let out_of_range = |v: f64| !(min..=max).contains(&v);
    let bad = match value {
        Value::Int(i) => Some(*i as f64).filter(|v| out_of_range(*v)),
        Value::Double(d) => Some(*d).filter(|v| out_of_range(*v)),
        Value::ArrayInt(a) => a.iter().map(|i| *i as f64).find(|v| out_of_range(*v)),
        Value::ArrayDouble(a) => a.iter().copied().find(|v| out_of_range(*v)),
        _ => None,
    };
    match bad {
        Some(value) => Err(Error::ArgumentRange {
            operation: operation.to_string(),
            argument: name.to_string(),
            value,
            min,
            max,
        }),
        None => Ok(()),
    }
}

#[cfg(test)]
pub mod tests {
    use super::*;
    use std::sync::Mutex;

    /// Operation that records the inputs it was built with and echoes
    /// `value * 2` into `out`.
    pub struct RecordingOperation {
        specs: Vec<ArgSpec>,
        pub calls: Mutex<Vec<f64>>,
    }

    impl RecordingOperation {
        pub fn new() -> Self {
            Self {
                specs: vec![
                    ArgSpec::input("value", "Input value", ValueType::Double).range(-10.0, 10.0),
                    ArgSpec::output("out", "Doubled value", ValueType::Double),
                    ArgSpec::input("offset", "Added after doubling", ValueType::Double)
                        .default_value(0.0),
                    ArgSpec::output("note", "Optional text", ValueType::String).optional(),
                ],
                calls: Mutex::new(Vec::new()),
            }
        }
    }

    impl Operation for RecordingOperation {
        fn name(&self) -> &str {
            "record"
        }

        fn description(&self) -> &str {
            "test operation"
        }

        fn args(&self) -> &[ArgSpec] {
            &self.specs
        }

        fn build(&self, args: &mut Arguments) -> std::result::Result<(), OperationError> {
            let value = args.double("value")?;
            let offset = args.double("offset")?;
            self.calls.lock().unwrap().push(value);
            args.set_output("out", value * 2.0 + offset);
            Ok(())
        }
    }

    fn instance() -> (Arc<RecordingOperation>, OperationInstance) {
        let op = Arc::new(RecordingOperation::new());
        let instance = OperationInstance::new(op.clone());
        (op, instance)
    }

    #[test]
    fn build_runs_with_defaults_filled() {
        let (op, mut instance) = instance();
        instance.set_property("value", Value::Int(3)).unwrap();
        instance.build().unwrap();

        assert!(instance.is_built());
        assert_eq!(instance.get_property("out").unwrap(), &Value::Double(6.0));
        assert_eq!(instance.get_property("offset").unwrap(), &Value::Double(0.0));
        assert_eq!(*op.calls.lock().unwrap(), vec![3.0]);
    }

    #[test]
    fn unknown_property_is_rejected() {
        let (_, mut instance) = instance();
        let err = instance.set_property("nope", Value::Int(1)).unwrap_err();
        assert!(matches!(err, Error::UnknownArgument { .. }));
    }

    #[test]
    fn wrong_type_is_rejected_not_coerced() {
        let (_, mut instance) = instance();
        let err = instance
            .set_property("value", Value::String("3".into()))
            .unwrap_err();
        assert!(matches!(
            err,
            Error::ArgumentType {
                expected: ValueType::Double,
                found: ValueType::String,
                ..
            }
        ));
    }

    #[test]
    fn out_of_range_is_rejected() {
        let (_, mut instance) = instance();
        let err = instance
            .set_property("value", Value::Double(11.0))
            .unwrap_err();
        assert!(matches!(err, Error::ArgumentRange { value, .. } if value == 11.0));
    }

    #[test]
    fn outputs_cannot_be_set_as_inputs() {
        let (_, mut instance) = instance();
        let err = instance.set_property("out", Value::Double(1.0)).unwrap_err();
        assert!(matches!(err, Error::ArgumentDirection { .. }));
    }

    #[test]
    fn missing_required_input_fails_before_build() {
        let (op, mut instance) = instance();
        let err = instance.build().unwrap_err();
        assert!(matches!(err, Error::MissingArgument { ref argument, .. } if argument == "value"));
        assert!(op.calls.lock().unwrap().is_empty());
    }

    #[test]
    fn optional_output_absent_is_reported_on_read() {
        let (_, mut instance) = instance();
        instance.set_property("value", Value::Double(1.0)).unwrap();
        instance.build().unwrap();
        let err = instance.get_property("note").unwrap_err();
        assert!(matches!(err, Error::MissingOutput { .. }));
    }

    #[test]
    fn null_image_input_is_invalid() {
        let op = crate::registry::lookup("copy").unwrap();
        let mut instance = OperationInstance::new(op);
        let err = instance
            .set_property("in", Value::Image(VImage::default()))
            .unwrap_err();
        assert!(matches!(err, Error::InvalidArgument { .. }));
    }
}
