/// Decides which `<dict>` entries survive a decode.
///
/// A filter applies to every dict below the node it is handed to, not just
/// the outermost one: an allowed field whose value is a list of dicts only
/// keeps the sub-dict keys that are themselves allowed. Keys made only of
/// ASCII digits are identifiers (image ids, face ids) and always pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldFilter<'a> {
    allowed: Option<&'a [&'a str]>,
}

impl<'a> FieldFilter<'a> {
    /// Keeps every key.
    pub const fn all() -> Self {
        FieldFilter { allowed: None }
    }

    /// Keeps `fields` and identifier keys.
    pub const fn only(fields: &'a [&'a str]) -> Self {
        FieldFilter {
            allowed: Some(fields),
        }
    }

    pub fn admits(&self, key: &str) -> bool {
        match self.allowed {
            None => true,
            Some(fields) => is_identifier(key) || fields.contains(&key),
        }
    }
}

impl Default for FieldFilter<'_> {
    fn default() -> Self {
        FieldFilter::all()
    }
}

/// True for non-empty keys made only of ASCII digits.
pub fn is_identifier(key: &str) -> bool {
    !key.is_empty() && key.bytes().all(|b| b.is_ascii_digit())
}
