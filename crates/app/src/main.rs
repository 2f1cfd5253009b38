fn main() {
    std::process::exit(graph_engine_cli::run_from_env());
}
