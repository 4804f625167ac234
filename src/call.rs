//! Generic by-name operation invocation.
//!
//! Every convenience method on [`VImage`](crate::VImage) ends up here:
//!
//! 1. look the operation up in the registry,
//! 2. apply the option string (if any), then each input of the [`VOption`],
//! 3. build,
//! 4. copy each requested output into the caller's storage.
//!
//! The operation instance is dropped on every path out of [`call_option_string`],
//! successful or not.

use crate::error::Result;
use crate::operation::OperationInstance;
use crate::option::VOption;
use crate::{option_string, registry};
use std::time::Instant;
use tracing::debug;

/// Run the named operation with the given arguments.
pub fn call(operation_name: &str, options: Option<VOption<'_>>) -> Result<()> {
    call_option_string(operation_name, None, options)
}

/// Run the named operation, first applying a `[name=value,...]` option
/// string and then the argument list.
pub fn call_option_string(
    operation_name: &str,
    option_string: Option<&str>,
    options: Option<VOption<'_>>,
) -> Result<()> {
    let started = Instant::now();
    debug!(operation = operation_name, "call");

    let operation = registry::lookup(operation_name)?;
    let mut instance = OperationInstance::new(operation);

    if let Some(option_string) = option_string {
        option_string::apply(&mut instance, option_string)?;
    }
    let pending = options.unwrap_or_default().apply_inputs(&mut instance)?;

    instance.build()?;
    pending.apply(&instance)?;

    debug!(
        operation = operation_name,
        elapsed_us = started.elapsed().as_micros() as u64,
        "call complete"
    );
    Ok(())
}
