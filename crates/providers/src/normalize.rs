//! Model-name normalization.
//!
//! Archetypes name a model once; each backend understands its own names.
//! The requested name is mapped to the closest supported one.

/// Map `requested` onto a name from `supported`.
///
/// Exact match first, then a case-insensitive substring match in either
/// direction (`gemini-1.5` matches `gemini-1.5-pro`, `gpt-4o-2024-08-06`
/// matches `gpt-4o`), then the first supported model. With nothing
/// supported the request passes through unchanged.
pub fn normalize_model(requested: &str, supported: &[String]) -> String {
    if supported.is_empty() || supported.iter().any(|m| m == requested) {
        return requested.to_string();
    }

    let wanted = requested.trim().to_ascii_lowercase();
    if !wanted.is_empty() {
        // Longest candidate wins so `gpt-4o` beats `gpt-4` for "gpt-4o-mini".
        let best = supported
            .iter()
            .filter(|m| {
                let m = m.to_ascii_lowercase();
                m.contains(&wanted) || wanted.contains(&m)
            })
            .max_by_key(|m| m.len());
        if let Some(m) = best {
            return m.clone();
        }
    }

    tracing::debug!(requested, fallback = %supported[0], "No model match, using first supported");
    supported[0].clone()
}
