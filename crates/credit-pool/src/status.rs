//! Per-credential budget status

use budget_probe::{BudgetReport, ProbeError};

use crate::credential::Credential;

/// Last known budget state of one credential.
///
/// Built only from a probe outcome. The remaining budget is always derived
/// from included and used, never stored.
#[derive(Debug, Clone, PartialEq)]
pub struct CredentialStatus {
    credential: Credential,
    included_usd: f64,
    used_usd: f64,
    valid: bool,
    last_error: Option<String>,
}

impl CredentialStatus {
    /// Status for a successful probe.
    pub fn from_report(credential: Credential, report: BudgetReport) -> Self {
        Self {
            credential,
            included_usd: report.included_usd.max(0.0),
            used_usd: report.used_usd.max(0.0),
            valid: true,
            last_error: None,
        }
    }

    /// Status for a failed probe: invalid, zero budget, error recorded.
    pub fn failed(credential: Credential, error: &ProbeError) -> Self {
        Self {
            credential,
            included_usd: 0.0,
            used_usd: 0.0,
            valid: false,
            last_error: Some(error.to_string()),
        }
    }

    pub fn credential(&self) -> &Credential {
        &self.credential
    }

    pub fn included_usd(&self) -> f64 {
        self.included_usd
    }

    pub fn used_usd(&self) -> f64 {
        self.used_usd
    }

    pub fn remaining_usd(&self) -> f64 {
        (self.included_usd - self.used_usd).max(0.0)
    }

    pub fn valid(&self) -> bool {
        self.valid
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// Share of the included budget already used, in percent.
    ///
    /// `None` when nothing is included (the ratio is undefined).
    pub fn used_percent(&self) -> Option<f64> {
        if self.included_usd > 0.0 {
            Some(self.used_usd / self.included_usd * 100.0)
        } else {
            None
        }
    }

    /// JSON view for health and admin endpoints. Never includes the token.
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::json!({
            "id": self.credential.fingerprint(),
            "preview": self.credential.preview(),
            "valid": self.valid,
            "included_usd": self.included_usd,
            "used_usd": self.used_usd,
            "remaining_usd": self.remaining_usd(),
            "used_percent": self.used_percent(),
            "last_error": self.last_error,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report(included_usd: f64, used_usd: f64) -> BudgetReport {
        BudgetReport {
            included_usd,
            used_usd,
        }
    }

    #[test]
    fn remaining_is_included_minus_used() {
        let status = CredentialStatus::from_report(Credential::new("a"), report(5.0, 1.5));
        assert_eq!(status.remaining_usd(), 3.5);
        assert!(status.valid());
        assert!(status.last_error().is_none());
    }

    #[test]
    fn remaining_never_negative_when_overspent() {
        let status = CredentialStatus::from_report(Credential::new("a"), report(5.0, 7.25));
        assert_eq!(status.remaining_usd(), 0.0);
    }

    #[test]
    fn failed_status_is_invalid_with_zero_budget() {
        let err = ProbeError::Status {
            endpoint: "users/me".into(),
            status: 500,
        };
        let status = CredentialStatus::failed(Credential::new("a"), &err);
        assert!(!status.valid());
        assert_eq!(status.remaining_usd(), 0.0);
        assert_eq!(status.last_error(), Some("users/me returned HTTP 500"));
    }

    #[test]
    fn used_percent_undefined_without_included_budget() {
        let free = CredentialStatus::from_report(Credential::new("a"), report(0.0, 0.0));
        assert_eq!(free.used_percent(), None);

        let half = CredentialStatus::from_report(Credential::new("a"), report(4.0, 2.0));
        assert_eq!(half.used_percent(), Some(50.0));
    }

    #[test]
    fn json_view_omits_token() {
        let status =
            CredentialStatus::from_report(Credential::new("apify_api_topsecret"), report(5.0, 1.0));
        let json = status.to_json();
        assert_eq!(json["remaining_usd"], 4.0);
        assert_eq!(json["valid"], true);
        assert!(json["last_error"].is_null());
        assert!(!json.to_string().contains("topsecret"));
    }
}
