//! TOML parser with helpful error messages

use std::path::Path;

use super::schema::EngineConfig;

/// Parse depgate.toml with detailed error messages
pub fn parse_config(path: &Path) -> crate::Result<EngineConfig> {
    let content = std::fs::read_to_string(path)?;
    parse_config_str(&content).map_err(|e| match e {
        crate::Error::Config(msg) => {
            crate::Error::Config(format!("{}: {}", path.display(), msg))
        }
        other => other,
    })
}

/// Parse depgate.toml content from string
pub fn parse_config_str(content: &str) -> crate::Result<EngineConfig> {
    let config: EngineConfig =
        toml::from_str(content).map_err(|e| enhance_toml_error(e, content))?;
    config.validate()?;
    Ok(config)
}

fn enhance_toml_error(error: toml::de::Error, content: &str) -> crate::Error {
    let message = error.message().to_string();
    match error.span() {
        Some(span) => {
            let line_num = content[..span.start.min(content.len())].matches('\n').count() + 1;
            crate::Error::Config(format!(
                "TOML parsing error at line {}:\n{}\n\nError: {}",
                line_num,
                line_context(content, line_num),
                message
            ))
        }
        None => crate::Error::Config(format!("TOML parsing error: {message}")),
    }
}

fn line_context(content: &str, line_num: usize) -> String {
    let lines: Vec<&str> = content.lines().collect();
    let start = line_num.saturating_sub(2);
    let end = (line_num + 1).min(lines.len());

    lines[start.min(end)..end]
        .iter()
        .enumerate()
        .map(|(i, line)| {
            let num = start + i + 1;
            let marker = if num == line_num { ">>>" } else { "   " };
            format!("{} {:4} | {}", marker, num, line)
        })
        .collect::<Vec<_>>()
        .join("\n")
}
