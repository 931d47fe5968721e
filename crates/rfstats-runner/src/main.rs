fn main() -> anyhow::Result<()> {
    rfstats_runner::run()
}
