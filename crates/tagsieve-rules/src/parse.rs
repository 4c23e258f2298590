//! Line-oriented rule text.
//!
//! ```text
//! // comments run to the end of the line
//! kitty => cat
//! cat -> animal
//! #beach ~> sand sea
//! cat <!> dog
//! tabby :: cat
//! ```

use tagsieve_core::rule::{TagOperator, TagRule};
use tagsieve_core::{Error, Result};

/// Strip one leading hash marker and surrounding whitespace.
pub fn normalize_tag(raw: &str) -> String {
    let t = raw.trim();
    t.strip_prefix('#').unwrap_or(t).to_string()
}

pub fn parse_rules(src: &str) -> Result<Vec<TagRule>> {
    let mut rules = Vec::new();

    for (idx, raw_line) in src.lines().enumerate() {
        let line_no = idx + 1;
        let line = match raw_line.find("//") {
            Some(pos) => &raw_line[..pos],
            None => raw_line,
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let tokens: Vec<&str> = line.split_whitespace().collect();
        let mut ops = tokens
            .iter()
            .enumerate()
            .filter_map(|(i, t)| TagOperator::from_symbol(t).map(|op| (i, op)));

        let Some((at, op)) = ops.next() else {
            return Err(Error::RuleSyntax {
                line: line_no,
                reason: format!("no rule operator in `{line}`"),
            });
        };
        if ops.next().is_some() {
            return Err(Error::RuleSyntax {
                line: line_no,
                reason: format!("more than one rule operator in `{line}`"),
            });
        }

        let side = |ts: &[&str]| -> Vec<String> {
            ts.iter()
                .map(|t| normalize_tag(t))
                .filter(|t| !t.is_empty())
                .collect()
        };
        let rule = TagRule::new(side(&tokens[..at]), op, side(&tokens[at + 1..])).map_err(|e| {
            Error::RuleSyntax {
                line: line_no,
                reason: e.to_string(),
            }
        })?;
        rules.push(rule);
    }

    Ok(rules)
}
