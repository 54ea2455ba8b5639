use anyhow::Result;

fn main() -> Result<()> {
    studentbox::cli::run()
}
