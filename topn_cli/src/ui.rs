use colored::Colorize;

pub fn print_header(text: &str) {
    println!("{}", text.bold().cyan());
    println!("{}", "=".repeat(text.len()).cyan());
}

pub fn print_success(text: &str) {
    println!("{} {}", "✓".green().bold(), text.green());
}

pub fn print_error(text: &str) {
    println!("{} {}", "✗".red().bold(), text.red());
}

pub fn print_warning(text: &str) {
    println!("{} {}", "⚠".yellow().bold(), text.yellow());
}

pub fn print_info(text: &str) {
    println!("{} {}", "ℹ".blue().bold(), text);
}
