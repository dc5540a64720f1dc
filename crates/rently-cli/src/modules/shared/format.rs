use serde_json::Value;

pub(crate) fn print_json(value: &Value) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

pub(crate) fn parse_key_value(raw: &str) -> anyhow::Result<(String, String)> {
    let Some((key, value)) = raw.split_once('=') else {
        anyhow::bail!("expected key=value, got: {raw}");
    };
    let key = key.trim();
    if key.is_empty() {
        anyhow::bail!("empty key in: {raw}");
    }
    Ok((key.to_string(), value.to_string()))
}
