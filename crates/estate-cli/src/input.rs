use serde::de::DeserializeOwned;
use std::error::Error;
use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};

/// Deserialize command input from `--input <file.json>` when given, else
/// from JSON piped on stdin. `Ok(None)` means neither was supplied and the
/// command should fall back to its flags.
pub fn load<T: DeserializeOwned>(path: Option<&str>) -> Result<Option<T>, Box<dyn Error>> {
    if let Some(path) = path {
        let file = existing_file(path)?;
        let contents = fs::read_to_string(&file)
            .map_err(|e| format!("Failed to read '{}': {}", file.display(), e))?;
        let value = serde_json::from_str(&contents)
            .map_err(|e| format!("Failed to parse '{}': {}", file.display(), e))?;
        return Ok(Some(value));
    }

    // An interactive terminal never carries piped input.
    if atty::is(atty::Stream::Stdin) {
        return Ok(None);
    }
    let mut buffer = String::new();
    io::stdin().read_to_string(&mut buffer)?;
    let trimmed = buffer.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }
    let value = serde_json::from_str(trimmed).map_err(|e| format!("Failed to parse stdin: {e}"))?;
    Ok(Some(value))
}

/// Like [`load`], for commands that have no flag fallback.
pub fn require<T: DeserializeOwned>(path: Option<&str>, what: &str) -> Result<T, Box<dyn Error>> {
    load(path)?.ok_or_else(|| format!("--input <file.json> or stdin required for {what}").into())
}

fn existing_file(path: &str) -> Result<PathBuf, Box<dyn Error>> {
    let p = Path::new(path);
    let resolved = if p.is_absolute() {
        p.to_path_buf()
    } else {
        std::env::current_dir()?.join(p)
    };
    if !resolved.exists() {
        return Err(format!("File not found: {}", resolved.display()).into());
    }
    if !resolved.is_file() {
        return Err(format!("Not a file: {}", resolved.display()).into());
    }
    Ok(resolved)
}
