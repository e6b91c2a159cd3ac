use std::sync::LazyLock;

use procession_program::BusinessEventReason;
use regex::Regex;

static BUSINESS_EVENT: LazyLock<Regex> = LazyLock::new(|| {
  Regex::new(r"^[A-Za-z0-9._-]+$").unwrap_or_else(|e| panic!("invalid business event pattern: {e}"))
});

/// Check an optional business event.
///
/// An absent event is fine. A present one must be a non-empty identifier of
/// letters, digits, `.`, `_` and `-`.
pub fn validate_business_event(event: Option<&str>) -> Result<(), BusinessEventReason> {
  match event {
    None => Ok(()),
    Some("") => Err(BusinessEventReason::Missing),
    Some(event) if BUSINESS_EVENT.is_match(event) => Ok(()),
    Some(_) => Err(BusinessEventReason::Malformed),
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_business_event_grammar() {
    assert_eq!(validate_business_event(None), Ok(()));
    assert_eq!(validate_business_event(Some("onboarding.v2_retail-1")), Ok(()));
    assert_eq!(
      validate_business_event(Some("")),
      Err(BusinessEventReason::Missing)
    );
    assert_eq!(
      validate_business_event(Some("bad event!")),
      Err(BusinessEventReason::Malformed)
    );
    assert_eq!(
      validate_business_event(Some("   ")),
      Err(BusinessEventReason::Malformed)
    );
  }
}
