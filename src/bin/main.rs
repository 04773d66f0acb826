#![forbid(unsafe_code)]

use colored::*;

fn main() {
    println!("{}", "powledger".bright_cyan().bold());
    println!("{}", "---------".bright_cyan());
    println!();
    println!(
        "{}",
        "This binary only prints help; the node runs as its own binary.".yellow()
    );
    println!();
    println!("{}", "Available binaries:".bright_green().underline());
    println!("  - {}", "powledger-node".bright_white());
    println!();
    println!("{}", "Endpoints served by a node:".bright_green().underline());
    println!("  - {}  {}", "POST".bright_white(), "/transactions/new");
    println!("  - {}   {}", "GET".bright_white(), "/mine");
    println!("  - {}   {}", "GET".bright_white(), "/chain");
    println!("  - {}  {}", "POST".bright_white(), "/nodes/register");
    println!("  - {}   {}", "GET".bright_white(), "/nodes/resolve");
    println!("  - {}   {}", "GET".bright_white(), "/health");
    println!();
    println!("{}", "Example:".bright_green().underline());
    println!("{}", "  cargo run --bin powledger-node -- --port 5001 --peer 127.0.0.1:5000".italic());
}
