//! Sentinel payloads used by cache backends.
//!
//! Backends answer every call with a string. A reply is one of:
//! - `OK` for a successful write or delete
//! - `__NO_TTL__` when an expiry is requested for a key without one
//! - `__MISS__:<CAUSE>` for a known miss cause
//! - `__FAILURE__:<CAUSE>` for a known internal failure cause
//! - anything else is a stored value (or, for expiry calls, epoch millis)
//!
//! Only the causes enumerated here count as misses. A sentinel-shaped reply
//! with an unknown cause is classified as a failure, never as a miss.

use std::fmt;

pub const ACK: &str = "OK";
pub const NO_TTL: &str = "__NO_TTL__";
pub const MISS_PREFIX: &str = "__MISS__:";
pub const FAILURE_PREFIX: &str = "__FAILURE__:";
const SENTINEL_PREFIX: &str = "__";

/// Known reasons a key has no value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MissCause {
  KeyNotFound,
  Expired,
  Evicted,
}

impl MissCause {
  pub const ALL: [MissCause; 3] = [MissCause::KeyNotFound, MissCause::Expired, MissCause::Evicted];

  pub fn code(self) -> &'static str {
    match self {
      MissCause::KeyNotFound => "KEY_NOT_FOUND",
      MissCause::Expired => "EXPIRED",
      MissCause::Evicted => "EVICTED",
    }
  }

  /// The full sentinel payload for this cause.
  pub fn sentinel(self) -> String {
    format!("{}{}", MISS_PREFIX, self.code())
  }
}

impl fmt::Display for MissCause {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.code())
  }
}

/// Known reasons the cache could not answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureCause {
  Timeout,
  ConnectionRefused,
  Unavailable,
  WriteRejected,
  /// A reply that matches no known payload shape.
  Unrecognized,
}

impl FailureCause {
  pub const KNOWN: [FailureCause; 4] = [
    FailureCause::Timeout,
    FailureCause::ConnectionRefused,
    FailureCause::Unavailable,
    FailureCause::WriteRejected,
  ];

  pub fn code(self) -> &'static str {
    match self {
      FailureCause::Timeout => "TIMEOUT",
      FailureCause::ConnectionRefused => "CONNECTION_REFUSED",
      FailureCause::Unavailable => "UNAVAILABLE",
      FailureCause::WriteRejected => "WRITE_REJECTED",
      FailureCause::Unrecognized => "UNRECOGNIZED",
    }
  }

  /// The full sentinel payload for this cause.
  pub fn sentinel(self) -> String {
    format!("{}{}", FAILURE_PREFIX, self.code())
  }
}

impl fmt::Display for FailureCause {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.code())
  }
}

/// A classified backend reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reply<'a> {
  Ack,
  NoTtl,
  Value(&'a str),
  Miss(MissCause),
  Failure(FailureCause),
}

/// Classify a raw backend reply.
pub fn classify(payload: &str) -> Reply<'_> {
  if payload == ACK {
    return Reply::Ack;
  }
  if payload == NO_TTL {
    return Reply::NoTtl;
  }
  if let Some(code) = payload.strip_prefix(MISS_PREFIX) {
    return match MissCause::ALL.iter().find(|c| c.code() == code) {
      Some(cause) => Reply::Miss(*cause),
      None => Reply::Failure(FailureCause::Unrecognized),
    };
  }
  if let Some(code) = payload.strip_prefix(FAILURE_PREFIX) {
    let cause = FailureCause::KNOWN
      .iter()
      .find(|c| c.code() == code)
      .copied()
      .unwrap_or(FailureCause::Unrecognized);
    return Reply::Failure(cause);
  }
  if payload.starts_with(SENTINEL_PREFIX) {
    return Reply::Failure(FailureCause::Unrecognized);
  }
  Reply::Value(payload)
}
