/// Scenario Linter: loads a content tree and reports broken references.
///
/// Usage: scenario_lint <content_root> [--parity] [--manifest]

use scenario_engine::core::audit::audit_registry;
use scenario_engine::core::registry::ScenarioRegistry;
use std::path::Path;
use std::process;

fn main() {
    env_logger::init();
    let args: Vec<String> = std::env::args().collect();

    if args.len() < 2 || args[1] == "--help" || args[1] == "-h" {
        println!("Usage: scenario_lint <content_root> [--parity] [--manifest]");
        process::exit(0);
    }

    let content_root = &args[1];
    let mut parity = false;
    let mut manifest = false;

    for arg in &args[2..] {
        match arg.as_str() {
            "--parity" => parity = true,
            "--manifest" => manifest = true,
            other => {
                eprintln!("Unknown argument: {}", other);
                process::exit(1);
            }
        }
    }

    if !Path::new(content_root).is_dir() {
        eprintln!("ERROR: Path '{}' is not a directory", content_root);
        process::exit(1);
    }

    let registry = match ScenarioRegistry::build_registry(content_root) {
        Ok(registry) => registry,
        Err(e) => {
            eprintln!("ERROR: Failed to load content: {}", e);
            process::exit(1);
        }
    };

    println!("Loaded {} scenarios", registry.len());

    if manifest {
        println!("\n=== Manifest ===\n");
        for entry in registry.manifest() {
            let locales: Vec<&str> = entry.locales.iter().map(|l| l.as_str()).collect();
            println!(
                "  {:<24} {:<7} [{}] {}",
                entry.scenario_id,
                if entry.legacy { "legacy" } else { "split" },
                locales.join(", "),
                entry
                    .path
                    .as_ref()
                    .map(|p| p.display().to_string())
                    .unwrap_or_default()
            );
        }
    }

    let issues = audit_registry(&registry, parity);
    let (errors, warnings): (Vec<_>, Vec<_>) = issues.iter().partition(|i| i.is_error());

    println!("\n=== Scenario Lint Report ===\n");

    if errors.is_empty() && warnings.is_empty() && registry.skipped().is_empty() {
        println!("All checks passed!");
    }

    for skipped in registry.skipped() {
        println!("SKIPPED: {} ({})", skipped.path.display(), skipped.reason);
    }

    for warning in &warnings {
        println!("WARNING: {}", warning);
    }

    for error in &errors {
        println!("ERROR: {}", error);
    }

    println!(
        "\nSummary: {} errors, {} warnings, {} skipped files",
        errors.len(),
        warnings.len(),
        registry.skipped().len()
    );

    if errors.is_empty() {
        process::exit(0);
    } else {
        process::exit(1);
    }
}
