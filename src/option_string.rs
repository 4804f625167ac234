//! `name[option,option=value]` strings.
//!
//! Filenames may carry load/save options in a trailing bracket, e.g.
//! `photo.jpg[Q=90,strip]`. The text of each option is parsed according to
//! the type the operation declares for that property; a bare name sets a
//! boolean property to `true`. Dashes in names are treated as underscores.

use crate::error::{Error, Result};
use crate::operation::OperationInstance;
use crate::value::{Value, ValueType};

/// Split `"file.png[compression=9]"` into `("file.png", Some("compression=9"))`.
pub fn split_filename(name: &str) -> (&str, Option<&str>) {
    let trimmed = name.trim_end();
    if let Some(body) = trimmed.strip_suffix(']') {
        if let Some(open) = find_option_open(body) {
            return (&body[..open], Some(&body[open + 1..]));
        }
    }
    (name, None)
}

// Index of the '[' that opens the trailing option block, honouring nested
// brackets inside option values.
fn find_option_open(body: &str) -> Option<usize> {
    let mut depth = 0usize;
    for (i, c) in body.char_indices().rev() {
        match c {
            ']' => depth += 1,
            '[' if depth == 0 => return Some(i),
            '[' => depth -= 1,
            _ => {}
        }
    }
    None
}

/// Break an option string into `(name, value)` pairs.
///
/// Accepts the string with or without its enclosing brackets. Commas inside
/// nested brackets do not split, so `background=[255,0,0]` stays one option.
pub fn parse(options: &str) -> Vec<(String, Option<String>)> {
    let mut text = options.trim();
    if let Some(inner) = text.strip_prefix('[').and_then(|t| t.strip_suffix(']')) {
        text = inner;
    }

    let mut items = Vec::new();
    let mut depth = 0usize;
    let mut start = 0;
    for (i, c) in text.char_indices() {
        match c {
            '[' => depth += 1,
            ']' => depth = depth.saturating_sub(1),
            ',' if depth == 0 => {
                items.push(&text[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    items.push(&text[start..]);

    items
        .into_iter()
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(|item| match item.split_once('=') {
            Some((name, value)) => {
                let value = value.trim();
                let value = value
                    .strip_prefix('[')
                    .and_then(|v| v.strip_suffix(']'))
                    .unwrap_or(value);
                (canonical_name(name), Some(value.to_string()))
            }
            None => (canonical_name(item), None),
        })
        .collect()
}

/// Argument names accept `-` for `_`.
pub fn canonical_name(name: &str) -> String {
    name.trim().replace('-', "_")
}

/// Parse `options` and assign each one to `instance`.
pub fn apply(instance: &mut OperationInstance, options: &str) -> Result<()> {
    for (name, text) in parse(options) {
        let spec = instance.arg_spec(&name).ok_or_else(|| Error::UnknownArgument {
            operation: instance.name().to_string(),
            argument: name.clone(),
        })?;

        let value = match text {
            None if spec.value_type == ValueType::Bool => Value::Bool(true),
            None => {
                return Err(Error::InvalidArgument {
                    operation: instance.name().to_string(),
                    argument: name,
                    reason: format!("expects a {} value", spec.value_type),
                });
            }
            Some(text) => {
                Value::parse(spec.value_type, &text).map_err(|reason| Error::InvalidArgument {
                    operation: instance.name().to_string(),
                    argument: name.clone(),
                    reason,
                })?
            }
        };

        instance.set_property(&name, value)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::operation::tests::RecordingOperation;
    use std::sync::Arc;

    #[test]
    fn split_plain_and_optioned_filenames() {
        assert_eq!(split_filename("a.png"), ("a.png", None));
        assert_eq!(
            split_filename("dir/a.jpg[Q=90,strip]"),
            ("dir/a.jpg", Some("Q=90,strip"))
        );
        assert_eq!(
            split_filename("a.png[background=[1,2]]"),
            ("a.png", Some("background=[1,2]"))
        );
    }

    #[test]
    fn parse_handles_bare_flags_and_nested_lists() {
        let parsed = parse("[Q=90, strip, background=[255,0,0], page-height=3]");
        assert_eq!(
            parsed,
            vec![
                ("Q".to_string(), Some("90".to_string())),
                ("strip".to_string(), None),
                ("background".to_string(), Some("255,0,0".to_string())),
                ("page_height".to_string(), Some("3".to_string())),
            ]
        );
        assert!(parse("").is_empty());
    }

    #[test]
    fn apply_types_values_from_declarations() {
        let mut instance = OperationInstance::new(Arc::new(RecordingOperation::new()));
        apply(&mut instance, "value=2.5,offset=1").unwrap();
        instance.build().unwrap();
        assert_eq!(instance.get_property("out").unwrap(), &Value::Double(6.0));
    }

    #[test]
    fn apply_rejects_unparseable_and_unknown() {
        let mut instance = OperationInstance::new(Arc::new(RecordingOperation::new()));
        let err = apply(&mut instance, "value=lots").unwrap_err();
        assert!(matches!(err, Error::InvalidArgument { .. }));

        let err = apply(&mut instance, "colour=red").unwrap_err();
        assert!(matches!(err, Error::UnknownArgument { .. }));

        let err = apply(&mut instance, "value").unwrap_err();
        assert!(matches!(err, Error::InvalidArgument { .. }));
    }
}
