//! Delta admission — the decision that keeps delta application strictly
//! sequential per resource.

use strand_protocol::Delta;

/// What to do with an inbound delta.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DeltaDecision {
    /// `baseVersion` matches the stored version; apply and advance.
    Apply,
    /// No usable local state — discard the delta and request a full
    /// snapshot (`subscribe_resource` with no `fromVersion`).
    Resync,
}

/// Decide whether a delta can be applied against the current local version.
///
/// Resynchronizing by snapshot on any mismatch is deliberate: it trades a
/// full-payload round trip for never having to buffer or reorder deltas.
pub fn decide(current_version: Option<u64>, delta: &Delta) -> DeltaDecision {
    match current_version {
        Some(version) if delta.base_version == version && delta.is_well_formed() => {
            DeltaDecision::Apply
        }
        _ => DeltaDecision::Resync,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn delta(base: u64, version: u64) -> Delta {
        Delta::new(base, version, json!({"x": 1}))
    }

    #[test]
    fn matching_base_applies() {
        assert_eq!(decide(Some(5), &delta(5, 6)), DeltaDecision::Apply);
    }

    #[test]
    fn missing_state_resyncs() {
        assert_eq!(decide(None, &delta(5, 6)), DeltaDecision::Resync);
    }

    #[test]
    fn stale_base_resyncs() {
        // Local version is ahead of the delta's base (duplicate delivery).
        assert_eq!(decide(Some(7), &delta(5, 6)), DeltaDecision::Resync);
    }

    #[test]
    fn future_base_resyncs() {
        // A gap: the delta assumes versions this client never saw.
        assert_eq!(decide(Some(3), &delta(5, 6)), DeltaDecision::Resync);
    }

    #[test]
    fn non_advancing_delta_resyncs() {
        // A delta that does not advance the version is malformed; treat it
        // like divergence rather than applying it.
        assert_eq!(decide(Some(5), &delta(5, 5)), DeltaDecision::Resync);
    }
}
