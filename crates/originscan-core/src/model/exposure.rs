use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString, IntoStaticStr};

use originscan_api::FailureKind;

/// Reachability of a hostname as observed from the public internet.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    EnumIter,
    IntoStaticStr,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE", ascii_case_insensitive)]
pub enum ExposureStatus {
    /// Synced but not yet checked.
    #[default]
    Pending,
    /// Answered with an HTTP response.
    Public,
    /// Answered 403: alive but refusing public access.
    Private,
    /// Refused, unresolvable, timed out, reset, aborted or TLS name mismatch.
    Unreachable,
    /// Any other failure.
    Error,
}

impl ExposureStatus {
    /// Whether a check has produced this status.
    pub fn is_checked(self) -> bool {
        !matches!(self, Self::Pending)
    }
}

/// How an origin behind the CDN leaks.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum OriginExposureType {
    /// Origin IP is shared with an unproxied record.
    IpLeak,
    /// IP leak, and the origin answered a direct request.
    Both,
}

/// Classify one probe outcome.
///
/// Order matters: a 403 is private even though it is an HTTP answer;
/// every other status in [200, 600) is public; transport failures that
/// mean "cannot get there" are unreachable; the rest is an error.
pub fn classify(http_status: Option<u16>, failure: Option<FailureKind>) -> ExposureStatus {
    match (http_status, failure) {
        (Some(403), _) => ExposureStatus::Private,
        (Some(code), _) if (200..600).contains(&code) => ExposureStatus::Public,
        (_, Some(kind)) if kind.is_unreachable() => ExposureStatus::Unreachable,
        _ => ExposureStatus::Error,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn forbidden_is_private() {
        assert_eq!(classify(Some(403), None), ExposureStatus::Private);
    }

    #[test]
    fn any_other_http_answer_is_public() {
        for code in [200, 204, 301, 401, 404, 418, 500, 503, 599] {
            assert_eq!(classify(Some(code), None), ExposureStatus::Public, "{code}");
        }
    }

    #[test]
    fn out_of_range_status_is_error() {
        assert_eq!(classify(Some(101), None), ExposureStatus::Error);
        assert_eq!(classify(Some(600), None), ExposureStatus::Error);
    }

    #[test]
    fn unreachable_failures() {
        for kind in [
            FailureKind::ConnectionRefused,
            FailureKind::DnsResolution,
            FailureKind::Timeout,
            FailureKind::ConnectionReset,
            FailureKind::ConnectionAborted,
            FailureKind::TlsHostnameMismatch,
        ] {
            assert_eq!(classify(None, Some(kind)), ExposureStatus::Unreachable, "{kind}");
        }
    }

    #[test]
    fn unknown_failure_is_error() {
        assert_eq!(classify(None, Some(FailureKind::Other)), ExposureStatus::Error);
        assert_eq!(classify(None, None), ExposureStatus::Error);
    }

    #[test]
    fn status_round_trips_through_strings() {
        assert_eq!(ExposureStatus::Unreachable.to_string(), "UNREACHABLE");
        assert_eq!(
            "private".parse::<ExposureStatus>().ok(),
            Some(ExposureStatus::Private)
        );
        assert_eq!(OriginExposureType::IpLeak.to_string(), "IP_LEAK");
    }
}
