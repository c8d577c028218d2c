fn main() {
    if let Err(err) = agent_reconcile::run() {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}
