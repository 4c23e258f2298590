//! tagsieve CLI: compile and inspect searches described by a YAML workspace.

use clap::{Args, Parser, Subcommand};
use std::fs;
use std::path::{Path, PathBuf};
use tagsieve_core::config::{SearchConfig, SimilarMode};
use tagsieve_core::hash::hash_serde;
use tagsieve_core::term::Term;
use tagsieve_exec::SqlBackend;
use tagsieve_planner::{parse_yaml_workspace_with, ParsedWorkspace};
use tracing_subscriber::EnvFilter;

type CliResult<T> = Result<T, Box<dyn std::error::Error>>;

#[derive(Parser)]
#[command(name = "tagsieve")]
#[command(about = "Compile tag-aware media searches into SQL and inspect tag rules", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args, Debug, Default, Clone)]
struct Overrides {
    /// Tag whose items are excluded unless the query names it
    #[arg(long)]
    hidden_tag: Option<String>,

    /// `identity` or `all` hash variants for `similar:` searches
    #[arg(long)]
    similar_mode: Option<SimilarMode>,

    /// Rating category used by `rating`, `ratings` and `stars`
    #[arg(long)]
    rating_category: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the compiled and optimized expression for the workspace query
    Explain {
        /// Path to the workspace YAML file
        #[arg(short, long)]
        workspace: PathBuf,

        #[command(flatten)]
        overrides: Overrides,
    },

    /// Print the SQL script for the workspace query
    Sql {
        #[arg(short, long)]
        workspace: PathBuf,

        #[command(flatten)]
        overrides: Overrides,
    },

    /// Run tag inference over a set of tags, or describe one tag
    Analyze {
        #[arg(short, long)]
        workspace: PathBuf,

        /// Describe this tag instead of analyzing a collection
        #[arg(long)]
        info: Option<String>,

        /// Tags held by the item
        tags: Vec<String>,
    },

    /// Validate a workspace YAML file (rules, config, query)
    Validate {
        #[arg(short, long)]
        workspace: PathBuf,
    },
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let result = match cli.command {
        Commands::Explain { workspace, overrides } => load(&workspace, &overrides).and_then(|ws| explain(&ws)),
        Commands::Sql { workspace, overrides } => load(&workspace, &overrides).and_then(|ws| sql(&ws)),
        Commands::Analyze { workspace, info, tags } => {
            load(&workspace, &Overrides::default()).and_then(|ws| analyze(&ws, info.as_deref(), &tags))
        }
        Commands::Validate { workspace } => load(&workspace, &Overrides::default()).and_then(|ws| validate(&ws)),
    };

    match result {
        Ok(out) => println!("{out}"),
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    }
}

fn load(path: &Path, overrides: &Overrides) -> CliResult<ParsedWorkspace> {
    tracing::debug!(path = %path.display(), "loading workspace");
    let src = fs::read_to_string(path)?;
    load_str(&src, overrides)
}

fn load_str(src: &str, overrides: &Overrides) -> CliResult<ParsedWorkspace> {
    let mut ws = parse_yaml_workspace_with(src, SearchConfig::from_env())?;
    apply_overrides(&mut ws.config, overrides);
    ws.config.validate()?;
    Ok(ws)
}

fn apply_overrides(cfg: &mut SearchConfig, overrides: &Overrides) {
    if let Some(tag) = &overrides.hidden_tag {
        cfg.hidden_tag = tag.clone();
    }
    if let Some(mode) = overrides.similar_mode {
        cfg.similar_mode = mode;
    }
    if let Some(category) = &overrides.rating_category {
        cfg.rating_category = category.clone();
    }
}

fn query(ws: &ParsedWorkspace) -> CliResult<&Term> {
    ws.query
        .as_ref()
        .ok_or_else(|| "workspace has no `query:`".into())
}

fn sql_backend(ws: &ParsedWorkspace) -> SqlBackend {
    let backend = SqlBackend::from_config(&ws.config);
    match &ws.star_ranges {
        Some(stars) => backend.with_star_ranges(stars.clone()),
        None => backend,
    }
}

fn explain(ws: &ParsedWorkspace) -> CliResult<String> {
    let term = query(ws)?;
    let compiled = ws.compile(term)?;
    let optimizer = ws.optimizer();
    let before = compiled.expression.size();
    let optimized = compiled.clone().map_expression(|e| optimizer.optimize(e));
    let fingerprint = hash_serde(&optimized.expression)?;

    let mut out = Vec::new();
    out.push("Search Plan".to_string());
    out.push("===========".to_string());
    out.push(format!("Query:       {term}"));
    out.push(format!("Compiled:    {}", compiled.expression));
    out.push(format!("Optimized:   {}", optimized.expression));
    out.push(format!("Nodes:       {} -> {}", before, optimized.expression.size()));
    out.push(format!(
        "Hidden:      {}",
        if optimized.mentions_hidden {
            "included (query names a hidden tag)".to_string()
        } else {
            format!("excluded {:?}", optimized.hidden_tags)
        }
    ));
    out.push(format!("Passes:      {}", optimizer.pass_names().join(", ")));
    out.push(format!("Fingerprint: {fingerprint}"));
    Ok(out.join("\n"))
}

fn sql(ws: &ParsedWorkspace) -> CliResult<String> {
    let search = ws.search(query(ws)?)?;
    let script = sql_backend(ws).compile(&search.expression)?;
    Ok(format!("-- fingerprint: {}\n{}", script.fingerprint, script.text))
}

fn analyze(ws: &ParsedWorkspace, info: Option<&str>, tags: &[String]) -> CliResult<String> {
    let out = match info {
        Some(tag) => serde_json::to_string_pretty(&ws.engine.tag_info(tag))?,
        None => serde_json::to_string_pretty(&ws.engine.analyze(tags))?,
    };
    Ok(out)
}

fn validate(ws: &ParsedWorkspace) -> CliResult<String> {
    let mut out = format!(
        "✓ Workspace is valid ({} known tags, {} saved searches)",
        ws.engine.known_tags().len(),
        ws.saved_searches.len()
    );
    if let Some(term) = &ws.query {
        ws.compile(term)
            .map_err(|e| format!("workspace parses but its query does not compile: {e}"))?;
        out.push_str("\n✓ Query compiles");
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    const WORKSPACE: &str = r#"
config: { rating_category: overall }
rules: |
  kitty => cat
  tabby :: cat
star_ranges: [[null, 1200], [1200, 1400], [1400, 1600], [1600, 1800], [1800, null]]
query:
  op: and
  terms:
    - { op: tag, value: kitty }
    - { op: field, field: stars, operator: ">=", value: 4 }
"#;

    #[test]
    fn cli_overrides_take_priority_over_workspace_config() {
        let overrides = Overrides {
            rating_category: Some("cli".into()),
            hidden_tag: Some("private".into()),
            ..Default::default()
        };
        let ws = load_str(WORKSPACE, &overrides).unwrap();
        assert_eq!(ws.config.rating_category, "cli");
        assert_eq!(ws.config.hidden_tag, "private");

        let ws = load_str(WORKSPACE, &Overrides::default()).unwrap();
        assert_eq!(ws.config.rating_category, "overall");
    }

    #[test]
    fn explain_reports_fingerprint_and_hidden_policy() {
        let ws = load_str(WORKSPACE, &Overrides::default()).unwrap();
        let out = explain(&ws).unwrap();
        assert!(out.contains("Fingerprint: "));
        assert!(out.contains("excluded"));
        assert!(out.contains("Passes:      eliminate-units"));
    }

    #[test]
    fn sql_uses_star_ranges_and_category() {
        let ws = load_str(WORKSPACE, &Overrides::default()).unwrap();
        let out = sql(&ws).unwrap();
        assert!(out.starts_with("-- fingerprint: "));
        assert!(out.contains("r.Value >= 1600.0"));
        assert!(out.contains("Category = 'overall'"));
    }

    #[test]
    fn analyze_and_info_emit_json() {
        let ws = load_str(WORKSPACE, &Overrides::default()).unwrap();
        let out = analyze(&ws, None, &["kitty".to_string()]).unwrap();
        let v: serde_json::Value = serde_json::from_str(&out).unwrap();
        assert_eq!(v["normalized_tags"][0], "cat");

        let info = analyze(&ws, Some("cat"), &[]).unwrap();
        let v: serde_json::Value = serde_json::from_str(&info).unwrap();
        assert_eq!(v["is_abstract"], true);
    }

    #[test]
    fn missing_query_is_an_error() {
        let ws = load_str("rules: \"a -> b\"", &Overrides::default()).unwrap();
        assert!(explain(&ws).is_err());
        assert!(validate(&ws).unwrap().starts_with("✓ Workspace is valid"));
    }

    #[test]
    fn validate_fails_on_a_query_that_does_not_compile() {
        let ws = load_str(WORKSPACE, &Overrides::default()).unwrap();
        assert!(validate(&ws).unwrap().ends_with("✓ Query compiles"));

        let broken = "query: { op: field, field: colour, operator: \"=\", value: red }";
        let ws = load_str(broken, &Overrides::default()).unwrap();
        let err = validate(&ws).unwrap_err().to_string();
        assert!(err.contains("does not compile"), "{err}");
    }
}
