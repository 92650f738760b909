fn main() {
    if let Err(err) = ollama_tui::cli::main() {
        eprintln!("❌ {err}");
        std::process::exit(1);
    }
}
