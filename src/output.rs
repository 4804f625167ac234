//! CLI output formatting.
//!
//! # Output Format
//!
//! ## list
//!
//! ```text
//! abs             absolute value of an image
//! add             add two images
//! ...
//! 42 operations
//! ```
//!
//! ## describe
//!
//! ```text
//! resize - resize an image
//! usage:
//!     resize in scale out [--option-name option-value ...]
//! where:
//!     in          - Input image, input image
//!     scale       - Scale image by this factor, input double
//!                   range: 0.000001 to 1000000
//!     out         - Output image, output image
//! optional arguments:
//!     vscale      - Vertical scale image by this factor, input double
//!                   range: 0.000001 to 1000000
//!     kernel      - Resampling kernel, input enum Kernel
//!                   default: linear
//! ```
//!
//! ## header
//!
//! ```text
//! photo.jpg: 640x480 uchar, 3 bands, srgb
//!     width: 640
//!     ...
//! ```
//!
//! Each command has a `format_*` function (returns `Vec<String>`) for
//! testability and a `print_*` wrapper that writes to stdout.

use crate::image::VImage;
use crate::registry::{ArgumentInfo, OperationInfo};
use crate::value::{Value, ValueType};

// ============================================================================
// Shared helpers
// ============================================================================

/// Return indentation string: 4 spaces per depth level.
fn indent(depth: usize) -> String {
    "    ".repeat(depth)
}

/// Required outputs named on the command line: images and blobs go to
/// files, everything else is printed.
fn is_file_output(arg: &ArgumentInfo) -> bool {
    arg.value_type == ValueType::Image.to_string() || arg.value_type == ValueType::Blob.to_string()
}

/// Width of the longest name, for aligning a name column.
fn name_width<'a>(names: impl Iterator<Item = &'a str>) -> usize {
    names.map(str::len).max().unwrap_or(0)
}

/// `name - description, direction Type` plus indented default and range lines.
fn argument_lines(arg: &ArgumentInfo, width: usize) -> Vec<String> {
    let mut lines = vec![format!(
        "{}{:<width$} - {}, {} {}",
        indent(1),
        arg.name,
        arg.description,
        arg.direction,
        arg.value_type,
    )];
    let pad = format!("{}{:width$}   ", indent(1), "");
    if let Some(default) = &arg.default {
        lines.push(format!("{pad}default: {default}"));
    }
    if let Some((min, max)) = arg.range {
        lines.push(format!("{pad}range: {min} to {max}"));
    }
    lines
}

// ============================================================================
// list
// ============================================================================

/// One line per operation, name column aligned, then a count.
pub fn format_operation_list(operations: &[OperationInfo]) -> Vec<String> {
    let width = name_width(operations.iter().map(|op| op.name.as_str()));
    let mut lines: Vec<String> = operations
        .iter()
        .map(|op| format!("{:<width$}  {}", op.name, op.description))
        .collect();
    lines.push(format!("{} operations", operations.len()));
    lines
}

pub fn print_operation_list(operations: &[OperationInfo]) {
    for line in format_operation_list(operations) {
        println!("{}", line);
    }
}

// ============================================================================
// describe
// ============================================================================

/// Usage text for one operation: the positional form, then required and
/// optional arguments.
pub fn format_describe(info: &OperationInfo) -> Vec<String> {
    let mut lines = vec![format!("{} - {}", info.name, info.description)];

    let positional: Vec<&str> = info
        .required_inputs()
        .chain(info.required_outputs().filter(|a| is_file_output(a)))
        .map(|a| a.name.as_str())
        .collect();
    lines.push("usage:".to_string());
    lines.push(format!(
        "{}{} {} [--option-name option-value ...]",
        indent(1),
        info.name,
        positional.join(" ")
    ));

    let width = name_width(info.arguments.iter().map(|a| a.name.as_str()));
    let required: Vec<&ArgumentInfo> = info
        .required_inputs()
        .chain(info.required_outputs())
        .collect();
    if !required.is_empty() {
        lines.push("where:".to_string());
        for arg in required {
            lines.extend(argument_lines(arg, width));
        }
    }

    let optional: Vec<&ArgumentInfo> = info.arguments.iter().filter(|a| !a.required).collect();
    if !optional.is_empty() {
        lines.push("optional arguments:".to_string());
        for arg in optional {
            lines.extend(argument_lines(arg, width));
        }
    }
    lines
}

pub fn print_describe(info: &OperationInfo) {
    for line in format_describe(info) {
        println!("{}", line);
    }
}

// ============================================================================
// header
// ============================================================================

/// Summary line followed by every field, or just the requested fields.
///
/// Fields that can't be read are shown as `<name>: (missing)` rather than
/// aborting the listing.
pub fn format_header(label: &str, image: &VImage, fields: &[String]) -> Vec<String> {
    let mut lines = vec![format!(
        "{}: {}x{} {}, {} band{}, {}",
        label,
        image.width(),
        image.height(),
        image.format(),
        image.bands(),
        if image.bands() == 1 { "" } else { "s" },
        image.interpretation(),
    )];

    let names = if fields.is_empty() {
        image.get_fields()
    } else {
        fields.to_vec()
    };
    for name in names {
        match image.get(&name) {
            Ok(value) => lines.push(format!("{}{}: {}", indent(1), name, value)),
            Err(_) => lines.push(format!("{}{}: (missing)", indent(1), name)),
        }
    }
    lines
}

pub fn print_header(label: &str, image: &VImage, fields: &[String]) {
    for line in format_header(label, image, fields) {
        println!("{}", line);
    }
}

// ============================================================================
// run
// ============================================================================

/// A non-image output of `run`. Single values print bare so scripts can
/// capture them; everything else is labelled.
pub fn format_output_value(name: &str, value: &Value, only: bool) -> String {
    if only {
        value.to_string()
    } else {
        format!("{}: {}", name, value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::describe;
    use crate::test_helpers::gradient;

    // =========================================================================
    // Helper tests
    // =========================================================================

    #[test]
    fn indent_levels() {
        assert_eq!(indent(0), "");
        assert_eq!(indent(2), "        ");
    }

    #[test]
    fn name_width_of_empty_is_zero() {
        assert_eq!(name_width(std::iter::empty()), 0);
        assert_eq!(name_width(["a", "abc", "ab"].into_iter()), 3);
    }

    // =========================================================================
    // list
    // =========================================================================

    #[test]
    fn list_aligns_names_and_counts() {
        let ops = vec![describe("abs").unwrap(), describe("gaussblur").unwrap()];
        let lines = format_operation_list(&ops);
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("abs        "));
        assert!(lines[1].starts_with("gaussblur  "));
        assert_eq!(lines[2], "2 operations");
    }

    // =========================================================================
    // describe
    // =========================================================================

    #[test]
    fn describe_lists_positional_then_optional() {
        let lines = format_describe(&describe("embed").unwrap());
        assert!(lines[0].starts_with("embed - "));
        assert_eq!(lines[1], "usage:");
        assert!(lines[2].starts_with("    embed in x y width height out"));
        let optional = lines
            .iter()
            .position(|l| l == "optional arguments:")
            .unwrap();
        assert!(lines[optional..].iter().any(|l| l.trim_start().starts_with("extend")));
        assert!(lines.iter().any(|l| l.trim_start().starts_with("default: black")));
    }

    #[test]
    fn describe_usage_omits_printed_outputs() {
        let lines = format_describe(&describe("avg").unwrap());
        assert_eq!(lines[2], "    avg in [--option-name option-value ...]");
        assert!(lines.iter().any(|l| l.trim_start().starts_with("out ")));
    }

    #[test]
    fn describe_shows_ranges() {
        let lines = format_describe(&describe("shrink").unwrap());
        assert!(lines.iter().any(|l| l.trim_start() == "range: 1 to 1000000"));
    }

    // =========================================================================
    // header
    // =========================================================================

    #[test]
    fn header_summary_and_all_fields() {
        let image = gradient(4, 2, 3);
        image.set("comment", "hello").unwrap();
        let lines = format_header("test", &image, &[]);
        assert_eq!(lines[0], "test: 4x2 uchar, 3 bands, srgb");
        assert!(lines.contains(&"    width: 4".to_string()));
        assert!(lines.contains(&"    comment: hello".to_string()));
    }

    #[test]
    fn header_selected_fields_with_missing() {
        let image = gradient(1, 1, 1);
        let fields = vec!["bands".to_string(), "nope".to_string()];
        let lines = format_header("x", &image, &fields);
        assert_eq!(lines[0], "x: 1x1 uchar, 1 band, b-w");
        assert_eq!(&lines[1..], &["    bands: 1", "    nope: (missing)"]);
    }

    // =========================================================================
    // run
    // =========================================================================

    #[test]
    fn output_values_bare_when_alone() {
        assert_eq!(format_output_value("out", &Value::Double(1.5), true), "1.5");
        assert_eq!(
            format_output_value("x", &Value::Int(3), false),
            "x: 3"
        );
    }
}
