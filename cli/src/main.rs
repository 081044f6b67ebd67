use anyhow::Result;

fn main() -> Result<()> {
    modcat_cli::run()
}
