fn main() -> anyhow::Result<()> {
    hotbench_cli::run()
}
