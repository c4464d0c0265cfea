//! regsign binary entrypoint.

fn main() -> anyhow::Result<()> {
    registrar_cli::run()?;
    Ok(())
}
