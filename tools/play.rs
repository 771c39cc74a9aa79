/// Play: interactive shell for walking a scenario from a content tree.
///
/// Usage: play <content_root> <scenario_id> [--locale <code>] [--seed <n>] [--config <path>]
///
/// Commands:
///   <n>                  take the n-th available choice
///   choose <id>          take a choice by id
///   continue             follow the scene's auto-advance
///   look                 reprint the current scene
///   locale <code>        switch language in place
///   flag <key> [on|off]  set a flag
///   stat <voice> <n>     set a voice level
///   evidence <id>        grant evidence
///   state                dump world state
///   save / load          snapshot to / from memory
///   restart              start the scenario again
///   quit                 exit

use scenario_engine::core::actions::{EvidenceStore, FlagStore, InMemoryWorld, StatsStore};
use scenario_engine::core::registry::ScenarioRegistry;
use scenario_engine::core::traversal::{Transition, Traversal, TraversalSnapshot};
use std::io::{self, BufRead, Write};
use std::path::Path;
use std::sync::Arc;

fn main() {
    env_logger::init();
    let args: Vec<String> = std::env::args().collect();

    if args.len() < 3 || args[1] == "--help" || args[1] == "-h" {
        print_usage();
        return;
    }

    let content_root = args[1].clone();
    let scenario_id = args[2].clone();
    let mut locale = None;
    let mut seed: u64 = 42;
    let mut config_path = None;

    let mut i = 3;
    while i < args.len() {
        match args[i].as_str() {
            "--locale" if i + 1 < args.len() => {
                i += 1;
                locale = Some(args[i].clone());
            }
            "--seed" if i + 1 < args.len() => {
                i += 1;
                seed = args[i].parse().unwrap_or(42);
            }
            "--config" if i + 1 < args.len() => {
                i += 1;
                config_path = Some(args[i].clone());
            }
            _ => {
                eprintln!("Unknown argument: {}", args[i]);
                print_usage();
                std::process::exit(1);
            }
        }
        i += 1;
    }

    let mut builder = ScenarioRegistry::builder().content_root(&content_root);
    if let Some(ref path) = config_path {
        builder = builder.config_file(path);
    }
    let registry = match builder.build() {
        Ok(registry) => Arc::new(registry),
        Err(e) => {
            eprintln!("ERROR: Failed to load '{}': {}", content_root, e);
            std::process::exit(1);
        }
    };
    if !registry.contains(&scenario_id) {
        eprintln!("ERROR: Unknown scenario '{}'", scenario_id);
        let ids: Vec<&str> = registry.ids().collect();
        eprintln!("Available: {}", ids.join(", "));
        std::process::exit(1);
    }

    let mut traversal = Traversal::new(registry.clone()).with_seed(seed);
    if let Some(ref code) = locale {
        traversal = traversal.with_locale(code);
    }
    let mut world = InMemoryWorld::new();
    let mut saved: Option<TraversalSnapshot> = None;

    println!("Content: {}", Path::new(&content_root).display());
    println!("Seed: {}", seed);
    println!("Type 'help' for commands.\n");

    let transition = traversal.start(&scenario_id, &mut world);
    report(&transition);
    show_scene(&traversal, &world);

    let stdin = io::stdin();
    let mut stdout = io::stdout();

    loop {
        print!("play> ");
        stdout.flush().ok();

        let mut line = String::new();
        if stdin.lock().read_line(&mut line).is_err() || line.is_empty() {
            break;
        }
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let parts: Vec<&str> = line.split_whitespace().collect();
        let cmd = parts[0].to_lowercase();

        if let Ok(index) = cmd.parse::<usize>() {
            let picked = traversal
                .available_choices(&world)
                .get(index.wrapping_sub(1))
                .map(|c| c.id.clone());
            match picked {
                Some(choice_id) => take_choice(&mut traversal, &mut world, &choice_id),
                None => println!("No choice #{}", index),
            }
            continue;
        }

        match cmd.as_str() {
            "quit" | "exit" | "q" => {
                println!("Goodbye.");
                break;
            }
            "help" | "h" | "?" => print_help(),
            "look" | "l" => show_scene(&traversal, &world),
            "choose" if parts.len() > 1 => take_choice(&mut traversal, &mut world, parts[1]),
            "continue" | "c" => {
                let transition = traversal.continue_scene(&mut world);
                report(&transition);
                show_scene(&traversal, &world);
            }
            "locale" if parts.len() > 1 => {
                let transition = traversal.set_locale(parts[1], &world);
                report(&transition);
                show_scene(&traversal, &world);
            }
            "flag" if parts.len() > 1 => {
                let value = !matches!(parts.get(2), Some(&"off") | Some(&"false"));
                world.set_flag(parts[1], value);
                println!("{} = {}", parts[1], value);
            }
            "stat" if parts.len() > 2 => match parts[2].parse::<i32>() {
                Ok(level) => {
                    world.set_stat(parts[1], level);
                    println!("{} = {}", parts[1], level);
                }
                Err(_) => println!("Not a number: {}", parts[2]),
            },
            "evidence" if parts.len() > 1 => {
                world.add_evidence(parts[1]);
                println!("Evidence granted: {}", parts[1]);
            }
            "state" => print_state(&traversal, &world),
            "save" => {
                let snapshot = traversal.snapshot();
                match snapshot.to_ron() {
                    Ok(text) => println!("{}", text),
                    Err(e) => println!("ERROR: {}", e),
                }
                saved = Some(snapshot);
            }
            "load" => match saved.clone() {
                Some(snapshot) => {
                    let transition = traversal.restore(snapshot, &world);
                    report(&transition);
                    show_scene(&traversal, &world);
                }
                None => println!("Nothing saved yet."),
            },
            "restart" => {
                world = InMemoryWorld::new();
                let transition = traversal.start(&scenario_id, &mut world);
                report(&transition);
                show_scene(&traversal, &world);
            }
            _ => println!("Unknown command: {}. Type 'help'.", line),
        }
    }
}

fn take_choice(traversal: &mut Traversal, world: &mut InMemoryWorld, choice_id: &str) {
    let outcome = traversal.choose(choice_id, world);
    if let Some(check) = &outcome.check {
        println!(
            "[{} {}: rolled {} + {} = {} vs {}] {}",
            check.voice_id,
            check.check_id,
            check.roll.roll,
            check.level,
            check.roll.total,
            check.difficulty,
            if check.roll.success { "SUCCESS" } else { "FAILURE" }
        );
    }
    report(&outcome.transition);
    show_scene(traversal, world);
}

fn report(transition: &Transition) {
    match transition {
        Transition::Entered(entry) => {
            for from in &entry.redirected_from {
                println!("(redirected from '{}')", from);
            }
            for passive in &entry.passives {
                if let Some(text) = &passive.text {
                    let tag = if passive.success { "+" } else { "-" };
                    println!("[{}{}] {}", passive.voice_id.to_uppercase(), tag, text);
                }
            }
        }
        Transition::Stayed { scene_id } => println!("(still in '{}')", scene_id),
        Transition::Resumed { scene_id } => println!("(resumed at '{}')", scene_id),
        Transition::Ended(reason) => println!("\n=== Scenario ended: {:?} ===\n", reason),
        Transition::Ignored => println!("(nothing happened)"),
    }
}

fn show_scene(traversal: &Traversal, world: &InMemoryWorld) {
    let Some(scene) = traversal.current_scene(world) else {
        return;
    };
    println!("\n--- {} ---", scene.id);
    if let Some(character) = &scene.character_id {
        println!("({})", character);
    }
    println!("{}\n", scene.text);

    let choices = traversal.available_choices(world);
    if choices.is_empty() {
        println!("  [continue]");
    }
    for (n, choice) in choices.iter().enumerate() {
        let check = choice
            .skill_check
            .as_ref()
            .map(|c| format!(" <{} {}>", c.voice_id, c.difficulty))
            .unwrap_or_default();
        println!("  {}. {}{}", n + 1, choice.text, check);
    }
    println!();
}

fn print_state(traversal: &Traversal, world: &InMemoryWorld) {
    println!("Locale: {}", traversal.locale());
    println!(
        "Scenario: {} / {}",
        traversal.active_scenario_id().unwrap_or("-"),
        traversal.stored_scene_id().unwrap_or("-")
    );
    let history: Vec<&str> = traversal.history().collect();
    println!("History: {}", history.join(" > "));

    let mut flags: Vec<_> = world.flags().iter().collect();
    flags.sort();
    println!("Flags: {:?}", flags);
    let mut evidence = world.evidence_ids();
    evidence.sort();
    println!("Evidence: {:?}", evidence);
    let mut counters: Vec<_> = world.counters.iter().collect();
    counters.sort();
    println!("Counters: {:?}", counters);
    let mut xp: Vec<_> = world.voice_xp.iter().collect();
    xp.sort();
    println!("Voice XP: {:?}", xp);
    println!("Battles: {}", world.battles.len());
}

fn print_usage() {
    println!("Usage: play <content_root> <scenario_id> [--locale <code>] [--seed <n>] [--config <path>]");
}

fn print_help() {
    println!("Commands:");
    println!("  <n>                  take the n-th available choice");
    println!("  choose <id>          take a choice by id");
    println!("  continue             follow the scene's auto-advance");
    println!("  look                 reprint the current scene");
    println!("  locale <code>        switch language in place");
    println!("  flag <key> [on|off]  set a flag");
    println!("  stat <voice> <n>     set a voice level");
    println!("  evidence <id>        grant evidence");
    println!("  state                dump world state");
    println!("  save / load          snapshot to / from memory");
    println!("  restart              start the scenario again");
    println!("  quit                 exit");
}
