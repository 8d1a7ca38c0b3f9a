use crate::error::ProtocolError;

/// The protocol version this build speaks absent any override (spec §4.1:
/// "the current version matches the implementation's minor version").
pub const CURRENT_VERSION: u16 = 1;

/// Resolves the version a connection will use for the rest of its lifetime,
/// given the sender's proposal and the receiver's own version (spec §4.1
/// "Version negotiation").
///
/// The receiver always wins: if `proposed` differs from `receiver_version`,
/// the caller on the receiver side announces `receiver_version` back and
/// the sender must either adopt it or abort. This function is called on
/// both sides with the same two numbers and returns the same verdict.
///
/// # Errors
///
/// Returns [`ProtocolError::VersionMismatch`] if the two versions are
/// incompatible per [`is_compatible`]. Otherwise returns the version both
/// sides will use, which is always `receiver_version`.
pub fn negotiate(proposed: u16, receiver_version: u16) -> Result<u16, ProtocolError> {
    if is_compatible(proposed, receiver_version) {
        Ok(receiver_version)
    } else {
        Err(ProtocolError::VersionMismatch {
            proposed,
            required: receiver_version,
        })
    }
}

/// Two versions are compatible when they agree on a major, defined here as
/// the whole version number rather than a dotted pair since the wire only
/// ever carries a single integer (spec §4.1). A future version bump that
/// changes framing should widen this rather than relax it silently.
#[must_use]
pub const fn is_compatible(a: u16, b: u16) -> bool {
    a == b
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matching_versions_negotiate_to_that_version() {
        assert_eq!(negotiate(1, 1).unwrap(), 1);
    }

    #[test]
    fn mismatched_versions_are_rejected() {
        let err = negotiate(9999, CURRENT_VERSION).unwrap_err();
        assert!(matches!(
            err,
            ProtocolError::VersionMismatch {
                proposed: 9999,
                required: CURRENT_VERSION,
            }
        ));
    }

    #[test]
    fn receiver_version_always_wins_on_success() {
        assert_eq!(negotiate(5, 5).unwrap(), 5);
    }
}
