//! Event topic identifiers used across transports.

/// Machine-friendly discriminator for log fields and metrics labels.
#[must_use]
pub const fn event_kind(event: &crate::payloads::Event) -> &'static str {
    event.kind()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::payloads::Event;

    #[test]
    fn event_kind_matches_payload() {
        assert_eq!(
            event_kind(&Event::CacheMiss {
                blob_id: "abc".into()
            }),
            "cache_miss"
        );
        assert_eq!(
            event_kind(&Event::HealthChanged {
                degraded: vec!["x".into()]
            }),
            "health_changed"
        );
    }
}
