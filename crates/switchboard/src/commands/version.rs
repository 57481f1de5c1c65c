pub fn run() -> anyhow::Result<()> {
    println!("switchboard {}", env!("CARGO_PKG_VERSION"));
    println!("Multi-signal turn routing for conversational handlers");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_output() {
        assert!(run().is_ok());
    }
}
