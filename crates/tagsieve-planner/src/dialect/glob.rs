//! `*` wildcards over known tag names.

use regex::{Regex, RegexBuilder};

use tagsieve_core::expr::TagSet;

pub fn is_glob(value: &str) -> bool {
    value.contains('*')
}

/// Escape each literal run and join the runs with `.*`; matches the whole
/// name, ignoring case.
pub fn glob_to_regex(pattern: &str) -> Result<Regex, regex::Error> {
    let body: Vec<String> = pattern.split('*').map(regex::escape).collect();
    RegexBuilder::new(&format!("^{}$", body.join(".*")))
        .case_insensitive(true)
        .build()
}

pub fn expand<'t, I>(pattern: &str, tags: I) -> Result<TagSet, regex::Error>
where
    I: IntoIterator<Item = &'t String>,
{
    let re = glob_to_regex(pattern)?;
    Ok(tags.into_iter().filter(|t| re.is_match(t)).cloned().collect())
}
