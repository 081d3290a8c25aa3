use colored::Colorize;
use std::process;

fn main() {
    match buildrun::cli::run() {
        Ok(code) => process::exit(code),
        Err(e) => {
            eprintln!("{} {}", "error:".red().bold(), e);
            process::exit(1);
        }
    }
}
