//! Prompt template rendering: `{{$name}}` blocks are replaced by variable values.
//!
//! Lookup order for a variable: bound value, then the parameter default from config.json, then
//! the empty string. Names match case-insensitively. Blocks that are not a single `$name`
//! (function calls, literals) are left in the output untouched.

use std::collections::BTreeMap;

/// Template variables by name.
pub type Variables = BTreeMap<String, String>;

/// Variable bound to the caller's input string.
pub const INPUT_VAR: &str = "input";

pub fn render(template: &str, vars: &Variables, defaults: &Variables) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(start) = rest.find("{{") {
        out.push_str(&rest[..start]);
        let after_open = &rest[start + 2..];
        let Some(end) = after_open.find("}}") else {
            out.push_str(&rest[start..]);
            return out;
        };
        let block = &after_open[..end];
        match variable_name(block) {
            Some(name) => out.push_str(lookup(name, vars, defaults)),
            None => {
                out.push_str("{{");
                out.push_str(block);
                out.push_str("}}");
            }
        }
        rest = &after_open[end + 2..];
    }
    out.push_str(rest);
    out
}

/// `$name` with optional surrounding whitespace; name is `[A-Za-z0-9_]+`.
fn variable_name(block: &str) -> Option<&str> {
    let name = block.trim().strip_prefix('$')?;
    if !name.is_empty() && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        Some(name)
    } else {
        None
    }
}

fn lookup<'a>(name: &str, vars: &'a Variables, defaults: &'a Variables) -> &'a str {
    let find = |m: &'a Variables| {
        m.iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    };
    find(vars).or_else(|| find(defaults)).unwrap_or("")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars(pairs: &[(&str, &str)]) -> Variables {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn substitutes_bound_variables() {
        let v = vars(&[("input", "cats"), ("style", "pun")]);
        assert_eq!(
            render("Joke about {{$input}} as a {{ $style }}.", &v, &Variables::new()),
            "Joke about cats as a pun."
        );
    }

    #[test]
    fn falls_back_to_defaults_then_empty() {
        let v = vars(&[("input", "dogs")]);
        let d = vars(&[("style", "limerick")]);
        assert_eq!(
            render("{{$input}}|{{$style}}|{{$missing}}", &v, &d),
            "dogs|limerick|"
        );
    }

    #[test]
    fn names_match_case_insensitively() {
        let v = vars(&[("Input", "x")]);
        assert_eq!(render("{{$INPUT}}", &v, &Variables::new()), "x");
    }

    #[test]
    fn non_variable_blocks_and_unclosed_braces_are_kept() {
        let v = vars(&[("input", "x")]);
        assert_eq!(
            render("{{WriterSkill.Brainstorm}} {{$input}} {{$", &v, &Variables::new()),
            "{{WriterSkill.Brainstorm}} x {{$"
        );
        assert_eq!(render("{{$bad name}}", &v, &Variables::new()), "{{$bad name}}");
    }

    #[test]
    fn values_are_not_rescanned() {
        let v = vars(&[("input", "{{$input}}")]);
        assert_eq!(render("<{{$input}}>", &v, &Variables::new()), "<{{$input}}>");
    }
}
