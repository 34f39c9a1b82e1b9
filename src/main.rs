//! upkg CLI - Tool for inspecting Unreal Engine 3 package files.

use std::env;
use std::fs;
use std::path::Path;
use std::process;

use upkg::pkg::reader;
use upkg::prelude::*;

fn main() {
    let args: Vec<String> = env::args().collect();

    // Parse global flags
    let mut verbosity = 0u8;
    let mut filtered_args: Vec<&str> = Vec::new();
    for arg in &args[1..] {
        match arg.as_str() {
            "-v" | "--verbose" => verbosity = 1,
            "-vv" | "--trace" => verbosity = 2,
            "-q" | "--quiet" => verbosity = u8::MAX,
            _ => filtered_args.push(arg),
        }
    }
    init_logging(verbosity);

    if filtered_args.is_empty() {
        print_help();
        return;
    }

    match filtered_args[0] {
        "info" | "i" => {
            let file = require_file(&filtered_args, "info");
            cmd_info(file);
        }
        "tree" | "t" => {
            let file = require_file(&filtered_args, "tree");
            cmd_tree(file);
        }
        "names" | "n" => {
            let file = require_file(&filtered_args, "names");
            cmd_names(file);
        }
        "refs" | "r" => {
            let file = require_file(&filtered_args, "refs");
            let path = match filtered_args.get(2) {
                Some(p) => p,
                None => {
                    eprintln!("Error: missing entry path argument");
                    eprintln!("Usage: upkg-cli refs <file.pcc> <Full.Object.Path>");
                    process::exit(1);
                }
            };
            cmd_refs(file, path);
        }
        "help" | "h" | "-h" | "--help" => print_help(),

        // Default: if file exists, show info; otherwise error
        _ => {
            if Path::new(filtered_args[0]).exists() {
                cmd_info(filtered_args[0]);
            } else {
                eprintln!("Unknown command: {}", filtered_args[0]);
                eprintln!();
                print_help();
                process::exit(1);
            }
        }
    }
}

fn init_logging(verbosity: u8) {
    let filter = match verbosity {
        0 => "upkg=info",
        1 => "upkg=debug",
        2 => "upkg=trace",
        _ => "off",
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_target(false)
        .init();
}

fn require_file<'a>(args: &[&'a str], command: &str) -> &'a str {
    match args.get(1) {
        Some(file) => file,
        None => {
            eprintln!("Error: missing file argument");
            eprintln!("Usage: upkg-cli {} <file.pcc>", command);
            process::exit(1);
        }
    }
}

fn print_help() {
    println!(
        "upkg-cli {} ({} {})",
        env!("CARGO_PKG_VERSION"),
        env!("UPKG_BUILD_DATE"),
        env!("UPKG_BUILD_TIME")
    );
    println!();
    println!("USAGE:");
    println!("    upkg-cli [OPTIONS] <COMMAND> [ARGS]");
    println!();
    println!("COMMANDS:");
    println!("    i, info  <file>           Show package info and entry counts");
    println!("    t, tree  <file>           Show full entry hierarchy");
    println!("    n, names <file>           Dump the name table");
    println!("    r, refs  <file> <path>    List everything referencing an entry");
    println!("    h, help                   Show this help");
    println!();
    println!("OPTIONS:");
    println!("    -v, --verbose    Show debug output");
    println!("    -vv, --trace     Show trace output (very verbose)");
    println!("    -q, --quiet      Suppress all output");
    println!();
    println!("EXAMPLES:");
    println!("    upkg-cli info BioP_Nor.pcc");
    println!("    upkg-cli tree SFXWeapon_Pistol.pcc");
    println!("    upkg-cli refs BioA_Nor.pcc BioA_Nor.TheWorld.PersistentLevel");
    println!();
    println!("NOTES:");
    println!("    - Passing a package file directly is equivalent to 'info'");
}

fn load(path: &str) -> PackageGraph {
    let bytes = match fs::read(path) {
        Ok(b) => b,
        Err(e) => {
            eprintln!("Failed to read {}: {}", path, e);
            process::exit(1);
        }
    };
    match reader::parse(&bytes) {
        Ok(graph) => graph,
        Err(e) => {
            eprintln!("Failed to parse {}: {}", path, e);
            process::exit(1);
        }
    }
}

fn cmd_info(path: &str) {
    let graph = load(path);

    println!("Package: {}", path);
    println!("Game:    {}", graph.game());
    println!("Names:   {}", graph.names().len());
    println!("Imports: {}", graph.import_count());
    println!("Exports: {}", graph.export_count());
    println!();

    // Count exports by class
    let mut by_class: Vec<(String, usize)> = Vec::new();
    for (reference, _) in graph.exports() {
        let class = graph
            .class_name(reference)
            .unwrap_or_else(|_| "?".to_string());
        match by_class.iter_mut().find(|(name, _)| *name == class) {
            Some((_, count)) => *count += 1,
            None => by_class.push((class, 1)),
        }
    }
    by_class.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));

    println!("Exports by class:");
    for (class, count) in by_class {
        println!("  {:6}  {}", count, class);
    }
}

fn cmd_tree(path: &str) {
    let graph = load(path);
    print_subtree(&graph, Reference::Null, 0);
}

fn print_subtree(graph: &PackageGraph, parent: Reference, depth: usize) {
    for child in graph.children(parent) {
        let name = graph
            .object_name(child)
            .unwrap_or_else(|_| "?".to_string());
        let class = graph
            .class_name(child)
            .unwrap_or_else(|_| "?".to_string());
        let tag = if child.is_import() { "[I]" } else { "[E]" };
        println!("{}{} {} ({})", "  ".repeat(depth), tag, name, class);
        print_subtree(graph, child, depth + 1);
    }
}

fn cmd_names(path: &str) {
    let graph = load(path);
    for (i, entry) in graph.names().iter().enumerate() {
        println!("{:6}  {}", i, entry.text);
    }
}

fn cmd_refs(path: &str, entry_path: &str) {
    let graph = load(path);
    let target = match graph.find_entry_by_path(entry_path) {
        Some(r) => r,
        None => {
            eprintln!("Entry not found: {}", entry_path);
            process::exit(1);
        }
    };

    let refs = match graph.referencers(target) {
        Ok(r) => r,
        Err(e) => {
            eprintln!("Reference scan failed: {}", e);
            process::exit(1);
        }
    };

    if refs.is_empty() {
        println!("Nothing references {}", graph.entry_string(target));
        return;
    }
    println!("References to {}:", graph.entry_string(target));
    for (source, location) in refs {
        println!("  {}  {}", graph.entry_string(source), location);
    }
}
