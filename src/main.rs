fn main() -> anyhow::Result<()> {
    trailbook::cli::run()
}
