use std::fmt;

/// Version reported by the native library, e.g. `11.0.5A`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct ApiVersion {
    pub major: u16,
    pub minor: u16,
    pub patch: u16,
    pub level: char,
}

impl ApiVersion {
    pub fn new(major: u16, minor: u16, patch: u16, level: char) -> Self {
        Self {
            major,
            minor,
            patch,
            level,
        }
    }

    /// Oldest library this crate binds against.
    pub fn minimum() -> Self {
        Self::new(11, 0, 5, 'A')
    }

    /// Parses `major.minor.patch` followed by a single level letter.
    pub fn parse(text: &str) -> Option<Self> {
        let text = text.trim();
        let mut parts = text.splitn(3, '.');
        let major = parts.next()?.parse().ok()?;
        let minor = parts.next()?.parse().ok()?;
        let rest = parts.next()?;

        let digits_end = rest
            .find(|c: char| !c.is_ascii_digit())
            .unwrap_or(rest.len());
        let patch = rest[..digits_end].parse().ok()?;
        let level = rest[digits_end..].chars().next()?;
        if !level.is_ascii_alphabetic() {
            return None;
        }

        Some(Self::new(major, minor, patch, level.to_ascii_uppercase()))
    }

    pub fn is_supported(&self) -> bool {
        *self >= Self::minimum()
    }
}

impl fmt::Display for ApiVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}{}", self.major, self.minor, self.patch, self.level)
    }
}
