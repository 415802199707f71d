use uuid::Uuid;

/// Correlation ID that follows a request through its log lines.
#[derive(Clone, Debug)]
pub struct TraceId(String);

impl TraceId {
    pub fn new(v: impl Into<String>) -> Self {
        Self(v.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for TraceId {
    fn default() -> Self {
        Self(Uuid::new_v4().hyphenated().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_ids_are_unique() {
        assert_ne!(TraceId::default().as_str(), TraceId::default().as_str());
    }

    #[test]
    fn explicit_id_is_kept() {
        assert_eq!(TraceId::new("req-1").as_str(), "req-1");
    }
}
