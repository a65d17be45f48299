use crate::decision::Decision;

/// Stable `code` field callers attach to the user-visible JSON error object
/// they synthesize from a non-allow `Decision`. Returns `None`
/// for decisions that aren't errors from the caller's point of view.
pub fn error_code(decision: &Decision) -> Option<&'static str> {
    match decision {
        Decision::Denied => Some("operation_denied"),
        Decision::NonInteractiveDenied => Some("non_interactive"),
        Decision::RateLimited { .. } => Some("rate_limited"),
        Decision::Aborted
        | Decision::Allowed { .. }
        | Decision::AllowedAlways { .. } => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_known_codes() {
        assert_eq!(error_code(&Decision::Denied), Some("operation_denied"));
        assert_eq!(
            error_code(&Decision::NonInteractiveDenied),
            Some("non_interactive")
        );
        assert_eq!(
            error_code(&Decision::RateLimited {
                retry_after_seconds: 1
            }),
            Some("rate_limited")
        );
        assert_eq!(error_code(&Decision::allowed()), None);
        assert_eq!(error_code(&Decision::Aborted), None);
    }
}
