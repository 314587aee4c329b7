// refs.rs: Turns legacy label and branch names into valid, unique git refs.

use std::collections::HashSet;

/// Sanitizes ref names and hands out each name at most once.
///
/// Legacy labels are free text (`Release 1.0 (final)`); git ref names cannot
/// contain spaces, `~^:?*[\`, control characters or `..`, and cannot start
/// with `-` or end with `.lock`. A label applied twice gets `-2`, `-3`, ...
#[derive(Debug, Default)]
pub struct RefNamer {
    taken: HashSet<String>,
}

impl RefNamer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reserve and return a unique ref name derived from `raw`.
    pub fn claim(&mut self, raw: &str) -> String {
        let base = sanitize(raw);
        let mut name = base.clone();
        let mut n = 2;
        while !self.taken.insert(name.clone()) {
            name = format!("{}-{}", base, n);
            n += 1;
        }
        name
    }

    /// Give a name back, e.g. when creating the ref failed.
    pub fn release(&mut self, name: &str) {
        self.taken.remove(name);
    }
}

/// Map `raw` onto the set of valid ref names.
pub fn sanitize(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.trim().chars() {
        let invalid = c.is_whitespace()
            || c.is_control()
            || matches!(c, '~' | '^' | ':' | '?' | '*' | '[' | '\\' | '@' | '{' | '}');
        if invalid {
            if !out.ends_with('_') {
                out.push('_');
            }
        } else {
            out.push(c);
        }
    }

    while out.contains("..") {
        out = out.replace("..", ".");
    }
    while out.contains("//") {
        out = out.replace("//", "/");
    }

    let mut name = out.trim_start_matches(['-', '.', '/']).to_string();
    loop {
        let before = name.len();
        if let Some(stripped) = name.strip_suffix(".lock") {
            name = stripped.to_string();
        }
        name = name.trim_end_matches(['.', '/', '_']).to_string();
        if name.len() == before {
            break;
        }
    }

    if name.is_empty() {
        "label".to_string()
    } else {
        name
    }
}
