pub(crate) fn run(targets: i64, groups: i64, json: bool) -> anyhow::Result<()> {
    let counts = rg_core::allocate(targets, groups).map_err(|e| anyhow::anyhow!("{e}"))?;

    if json {
        println!("{}", serde_json::to_string(&counts)?);
    } else {
        for (i, count) in counts.iter().enumerate() {
            println!("group {}: {count}", i + 1);
        }
    }
    Ok(())
}
