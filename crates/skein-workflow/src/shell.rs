use std::path::Path;

/// Quote a word for `bash`, leaving plain words untouched.
pub fn shell_quote(word: &str) -> String {
  let plain = !word.is_empty()
    && word
      .chars()
      .all(|c| c.is_ascii_alphanumeric() || "_./:@%+=,-".contains(c));
  if plain {
    word.to_string()
  } else {
    format!("'{}'", word.replace('\'', r"'\''"))
  }
}

/// Quote a path for `bash`.
pub fn quote_path(path: &Path) -> String {
  shell_quote(&path.to_string_lossy())
}
