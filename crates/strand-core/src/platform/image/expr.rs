//! Operator expression text for the image backend.
//!
//! Only the forms an operator passes to the thread commands are understood:
//!
//! - integer literals, decimal or `0x` hex, typed `long`
//! - pointer casts, `(Arachne::ThreadContext *) 0x7f00`
//! - registers, `$sp`, `$rbp`, `$rip`
//! - globals, `Arachne::core.loadedContext`
//! - array elements, `Arachne::core.localThreadContexts[3]`

use super::ImageDebugger;
use crate::debugger::TargetDebugger;
use crate::error::{Result, StrandError};
use crate::types::value::pointee_type;
use crate::types::{Expr, RegisterId, Value};

impl ImageDebugger
{
    pub(super) fn evaluate_text(&self, text: &str) -> Result<Value>
    {
        let text = text.trim();
        if text.is_empty() {
            return Err(StrandError::evaluation(text, "Argument required (expression to compute)."));
        }

        if text.starts_with('(') {
            let Some(close) = matching_paren(text) else {
                return Err(StrandError::evaluation(text, "A syntax error in expression."));
            };
            let inner = text[1..close].trim();
            let operand = text[close + 1..].trim();
            if operand.is_empty() {
                return self.evaluate_text(inner);
            }
            if pointee_type(inner).is_none() {
                return Err(StrandError::evaluation(text, format!("Only pointer casts are supported, not `{inner}`.")));
            }
            let value = self.evaluate_text(operand)?;
            return Ok(Value::new(inner, value.raw()));
        }

        if let Some(name) = text.strip_prefix('$') {
            let register = RegisterId::from_name(name)
                .ok_or_else(|| StrandError::evaluation(text, format!("Invalid register `{name}`.")))?;
            let value = self.read_register(register)?;
            return Ok(Value::new("uint64_t", value));
        }

        if let Some(number) = parse_integer(text) {
            return Ok(Value::new("long", number));
        }

        if let Some((array, index)) = text.strip_suffix(']').and_then(|t| t.split_once('[')) {
            let index = parse_integer(index.trim())
                .and_then(|index| usize::try_from(index).ok())
                .ok_or_else(|| StrandError::evaluation(text, "Array index must be an integer."))?;
            let array = array.trim();
            return self.element(
                array,
                index,
                &Expr::Element {
                    array: array.to_string(),
                    index,
                },
            );
        }

        self.variable(text, &Expr::Text(text.to_string()))
    }

    pub(super) fn variable(&self, name: &str, expression: &Expr) -> Result<Value>
    {
        self.variables
            .get(name)
            .cloned()
            .ok_or_else(|| StrandError::evaluation(expression, format!("No symbol \"{name}\" in current context.")))
    }

    pub(super) fn element(&self, array: &str, index: usize, expression: &Expr) -> Result<Value>
    {
        let elements = self
            .arrays
            .get(array)
            .ok_or_else(|| StrandError::evaluation(expression, format!("No symbol \"{array}\" in current context.")))?;
        elements.get(index).cloned().ok_or_else(|| {
            StrandError::evaluation(
                expression,
                format!("Index {index} is out of bounds for `{array}` ({} elements).", elements.len()),
            )
        })
    }
}

fn parse_integer(text: &str) -> Option<u64>
{
    match text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
        Some(hex) => u64::from_str_radix(hex, 16).ok(),
        None => text.parse().ok(),
    }
}

/// Byte index of the `)` closing the `(` that `text` starts with.
fn matching_paren(text: &str) -> Option<usize>
{
    let mut depth = 0usize;
    for (i, c) in text.char_indices() {
        match c {
            '(' => depth += 1,
            ')' => {
                depth = depth.checked_sub(1)?;
                if depth == 0 {
                    return Some(i);
                }
            }
            _ => {}
        }
    }
    None
}
