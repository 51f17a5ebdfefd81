//! Block Popup CLI
//!
//! CLI tool for maintaining rule stores and trying rules against saved pages.

use std::fs;

use clap::{Parser, Subcommand};
use env_logger::{Builder, Env};
use serde::Serialize;

use bp_core::page::{PageElement, PageSnapshot};
use bp_core::{
    create_rule_from_element, find_stable_selector, generate_rule_variants, ElementView, Matcher,
    Outcome, Priority, Rule, Session, Tuning, Viewport,
};
use bp_rules::{lint_store, merge_into, parse_import, parse_rule_store, RuleStore};

#[derive(Parser)]
#[command(name = "bp-cli")]
#[command(about = "Block Popup rule store tools")]
struct Cli {
    /// Tuning file overriding the default thresholds
    #[arg(long, global = true)]
    tuning: Option<String>,

    /// Debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate an exported rule store
    Validate {
        /// Store file to validate
        #[arg(short, long)]
        input: String,
    },

    /// Dump rule store info
    Info {
        /// Store file to inspect
        #[arg(short, long)]
        input: String,
    },

    /// Merge default catalogs or imports into a store
    Merge {
        /// Existing store; starts empty when omitted
        #[arg(short, long)]
        input: Option<String>,

        /// Catalogs to merge, in order
        #[arg(short, long, required = true)]
        defaults: Vec<String>,

        /// Output store file
        #[arg(short, long, default_value = "rules.json")]
        output: String,
    },

    /// Run a site's rules against a saved HTML page
    Scan {
        /// Rule store file
        #[arg(short, long)]
        store: String,

        /// Hostname the page belongs to
        #[arg(long)]
        host: String,

        /// Saved HTML page
        #[arg(short, long)]
        page: String,

        /// Viewport as WIDTHxHEIGHT
        #[arg(long, default_value = "1280x800", value_parser = parse_viewport)]
        viewport: Viewport,

        /// List popup-shaped elements instead of blocking
        #[arg(long)]
        detect: bool,
    },

    /// Suggest rules for an element of a saved HTML page
    Suggest {
        /// Saved HTML page
        #[arg(short, long)]
        page: String,

        /// CSS selector picking the element
        #[arg(long)]
        selector: String,

        /// Viewport as WIDTHxHEIGHT
        #[arg(long, default_value = "1280x800", value_parser = parse_viewport)]
        viewport: Viewport,
    },
}

fn main() {
    let cli = Cli::parse();

    let level = if cli.verbose { "debug" } else { "warn" };
    Builder::from_env(Env::default().default_filter_or(level)).init();

    let result = load_tuning(cli.tuning.as_deref()).and_then(|tuning| match cli.command {
        Commands::Validate { input } => cmd_validate(&input),
        Commands::Info { input } => cmd_info(&input),
        Commands::Merge {
            input,
            defaults,
            output,
        } => cmd_merge(input.as_deref(), &defaults, &output),
        Commands::Scan {
            store,
            host,
            page,
            viewport,
            detect,
        } => cmd_scan(&store, &host, &page, viewport, detect, tuning),
        Commands::Suggest {
            page,
            selector,
            viewport,
        } => cmd_suggest(&page, &selector, viewport, &tuning),
    });

    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

fn read(path: &str) -> Result<String, String> {
    fs::read_to_string(path).map_err(|e| format!("Failed to read '{}': {}", path, e))
}

fn load_tuning(path: Option<&str>) -> Result<Tuning, String> {
    match path {
        Some(path) => {
            Tuning::from_json(&read(path)?).map_err(|e| format!("Invalid tuning '{}': {}", path, e))
        }
        None => Ok(Tuning::default()),
    }
}

fn load_store(path: &str) -> Result<RuleStore, String> {
    parse_rule_store(&read(path)?).map_err(|e| format!("Invalid store '{}': {}", path, e))
}

fn parse_viewport(value: &str) -> Result<Viewport, String> {
    let (width, height) = value
        .split_once(['x', 'X'])
        .ok_or_else(|| format!("expected WIDTHxHEIGHT, got '{value}'"))?;
    let dimension = |raw: &str| {
        raw.trim()
            .parse::<f64>()
            .ok()
            .filter(|size| *size > 0.0)
            .ok_or_else(|| format!("invalid dimension '{raw}'"))
    };
    Ok(Viewport::new(dimension(width)?, dimension(height)?))
}

fn cmd_validate(input: &str) -> Result<(), String> {
    let store = parse_import(&read(input)?).map_err(|e| e.to_string())?;
    let issues = lint_store(&store);

    for issue in &issues {
        println!("  {issue}");
    }
    if !issues.is_empty() {
        return Err(format!("{} rules failed validation", issues.len()));
    }

    println!("Store is valid");
    println!("  Sites: {}", store.len());
    println!("  Rules: {}", store.rule_count());
    Ok(())
}

fn cmd_info(input: &str) -> Result<(), String> {
    let store = load_store(input)?;

    println!("Rule store: {}", input);
    println!("  Sites: {}", store.len());
    println!("  Rules: {}", store.rule_count());
    println!();

    for (host, site) in store.sites() {
        let enabled = site.enabled_rules().count();
        println!(
            "  {} [{}] {} rules ({} enabled)",
            host,
            if site.enabled { "on" } else { "off" },
            site.rules.len(),
            enabled
        );
        for rule in &site.rules {
            println!(
                "    {} {}{}",
                if rule.enabled { "+" } else { "-" },
                display_description(rule),
                if rule.is_legacy() { " (legacy)" } else { "" }
            );
        }
    }

    Ok(())
}

fn cmd_merge(input: Option<&str>, defaults: &[String], output: &str) -> Result<(), String> {
    let mut store = match input {
        Some(path) => load_store(path)?,
        None => RuleStore::new(),
    };

    for path in defaults {
        let catalog = parse_import(&read(path)?).map_err(|e| format!("Invalid catalog '{}': {}", path, e))?;
        let stats = merge_into(&mut store, catalog);
        println!(
            "  {}: {} sites added, {} rules added, {} skipped",
            path, stats.sites_added, stats.rules_added, stats.rules_skipped
        );
    }

    let json = store.to_json_pretty().map_err(|e| e.to_string())?;
    fs::write(output, json).map_err(|e| format!("Failed to write '{}': {}", output, e))?;

    println!("Wrote {} sites, {} rules to '{}'", store.len(), store.rule_count(), output);
    Ok(())
}

fn cmd_scan(
    store_path: &str,
    host: &str,
    page_path: &str,
    viewport: Viewport,
    detect: bool,
    tuning: Tuning,
) -> Result<(), String> {
    let store = load_store(store_path)?;
    let page = PageSnapshot::parse(&read(page_path)?).with_viewport(viewport);
    let matcher = Matcher::new(tuning);
    let mut session = Session::new(host, store.get(host).cloned(), matcher);

    if detect {
        let queue = session.start_detection(page.elements());
        let scheduled = queue.len();
        let mut detected = 0usize;
        for task in queue {
            if session.run_task(&task) == Outcome::Detected {
                detected += 1;
                println!("  popup  {:>4}ms  {}", task.delay_ms, describe_element(&task.item));
            }
        }
        println!("Detected {} popup-shaped elements of {} scanned", detected, scheduled);
        return Ok(());
    }

    if !session.is_active() {
        println!("Blocking is not active for {}", host);
        return Ok(());
    }

    for element in page.elements() {
        if session.analyze(&element) == Outcome::Blocked {
            let rule = session
                .matcher()
                .matching_rule(&element, session.rules())
                .map(display_description)
                .unwrap_or_default();
            println!("  blocked  {}  ({})", describe_element(&element), rule);
        }
    }
    println!("Blocked {} elements on {}", session.blocked_count(), host);
    Ok(())
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Suggestion {
    stable_selector: Option<String>,
    combined: Rule,
    variants: Vec<bp_core::RuleVariant>,
}

fn cmd_suggest(page_path: &str, selector: &str, viewport: Viewport, tuning: &Tuning) -> Result<(), String> {
    let page = PageSnapshot::parse(&read(page_path)?).with_viewport(viewport);
    let element = page
        .select_first(selector)
        .ok_or_else(|| format!("No element matches '{}'", selector))?;

    let matcher = Matcher::new(tuning.clone());
    if let Some(reason) = matcher.is_critical(&element).reason {
        return Err(format!("{} is off-limits ({})", describe_element(&element), reason));
    }

    let suggestion = Suggestion {
        stable_selector: find_stable_selector(&element, tuning),
        combined: create_rule_from_element(&element, tuning),
        variants: generate_rule_variants(&element, tuning),
    };

    println!("Element: {}", describe_element(&element));
    println!("Popup-shaped: {}", matcher.is_popup_shaped(&element));
    for variant in &suggestion.variants {
        println!("  [{}] {}", priority_label(variant.priority), variant.rule.description);
    }
    println!();
    println!(
        "{}",
        serde_json::to_string_pretty(&suggestion).map_err(|e| e.to_string())?
    );
    Ok(())
}

fn priority_label(priority: Priority) -> &'static str {
    match priority {
        Priority::High => "high",
        Priority::Medium => "medium",
        Priority::Low => "low",
    }
}

fn display_description(rule: &Rule) -> String {
    if rule.description.is_empty() {
        bp_core::types::describe_conditions(&rule.conditions)
    } else {
        rule.description.clone()
    }
}

fn describe_element(element: &PageElement<'_>) -> String {
    let mut out = element.tag_name().to_lowercase();
    let id = element.id();
    if !id.is_empty() {
        out.push('#');
        out.push_str(&id);
    }
    for class in element.class_list() {
        out.push('.');
        out.push_str(&class);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_viewport() {
        assert_eq!(parse_viewport("1280x800"), Ok(Viewport::new(1280.0, 800.0)));
        assert_eq!(parse_viewport("375X667"), Ok(Viewport::new(375.0, 667.0)));
        assert!(parse_viewport("1280").is_err());
        assert!(parse_viewport("0x800").is_err());
    }

    #[test]
    fn test_describe_element() {
        let page = PageSnapshot::parse(r#"<div id="promo" class="overlay dark">x</div>"#);
        let element = page.select_first("#promo").unwrap();
        assert_eq!(describe_element(&element), "div#promo.overlay.dark");
    }
}
