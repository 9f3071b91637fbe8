const VALUE_FUNCTION: &str = "value(";

/// Replace `value(name)` calls in a declaration value with whatever `lookup`
/// returns for `name`. Calls the lookup cannot answer are left as written.
pub fn replace_value_functions<F>(value: &str, mut lookup: F) -> String
where
    F: FnMut(&str) -> Option<String>,
{
    let mut out = String::with_capacity(value.len());
    let mut rest = value;

    while let Some(start) = find_call(rest) {
        let args_start = start + VALUE_FUNCTION.len();
        let Some(len) = closing_paren(&rest[args_start..]) else {
            break;
        };
        out.push_str(&rest[..start]);
        let call_end = args_start + len + 1;
        let name = rest[args_start..args_start + len].trim();
        match lookup(name) {
            Some(replacement) => out.push_str(&replacement),
            None => out.push_str(&rest[start..call_end]),
        }
        rest = &rest[call_end..];
    }

    out.push_str(rest);
    out
}

/// Offset of the next `value(` that is not the tail of a longer identifier
fn find_call(text: &str) -> Option<usize> {
    let mut offset = 0;
    while let Some(found) = text[offset..].find(VALUE_FUNCTION) {
        let index = offset + found;
        let preceded_by_ident = text[..index]
            .chars()
            .next_back()
            .is_some_and(|c| c.is_alphanumeric() || c == '-' || c == '_');
        if !preceded_by_ident {
            return Some(index);
        }
        offset = index + VALUE_FUNCTION.len();
    }
    None
}

/// Length of the argument text up to the matching `)`
fn closing_paren(text: &str) -> Option<usize> {
    let mut depth = 0usize;
    for (index, c) in text.char_indices() {
        match c {
            '(' => depth += 1,
            ')' if depth == 0 => return Some(index),
            ')' => depth -= 1,
            _ => {}
        }
    }
    None
}
