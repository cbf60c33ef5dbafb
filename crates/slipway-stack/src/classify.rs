//! Failure signature classification
//!
//! The control plane reports failures as free-form reason strings. One
//! failure mode is known and self-service remediable: the account lacks
//! the service-linked role a managed service needs before it can
//! provision resources. Detection is string matching against recorded
//! payloads, kept in one named function so the signatures stay
//! unit-testable.

/// Classification of a remote failure reason
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureClass {
    /// Missing one-time account-level service-linked role
    PrerequisiteMissing,
    /// Anything else; surfaced verbatim as a generic stack failure
    Generic,
}

/// Recorded signatures of the missing service-linked-role failure
const PREREQUISITE_SIGNATURES: &[&str] = &[
    "iam:createservicelinkedrole",
    "unable to assume the service linked role",
];

/// Classify a remote-reported failure reason
pub fn classify_failure(reason: &str) -> FailureClass {
    let lowered = reason.to_lowercase();
    if PREREQUISITE_SIGNATURES.iter().any(|sig| lowered.contains(sig)) {
        return FailureClass::PrerequisiteMissing;
    }
    if lowered.contains("service-linked role") && lowered.contains("does not exist") {
        return FailureClass::PrerequisiteMissing;
    }
    FailureClass::Generic
}

/// Operator-facing remediation text for the prerequisite failure
pub fn prerequisite_remediation() -> String {
    "The account is missing a one-time service-linked role. Have an account \
     administrator create the role for the managed service (once per account), \
     then re-run the deployment."
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    // Recorded sample payloads from real control-plane responses
    const SAMPLE_IAM_DENIED: &str = "API: iam:CreateServiceLinkedRole User: \
        arn:aws:sts::123456789012:assumed-role/deployer/run is not authorized \
        to perform: iam:CreateServiceLinkedRole on resource: \
        arn:aws:iam::123456789012:role/aws-service-role/ecs.amazonaws.com/AWSServiceRoleForECS";
    const SAMPLE_ROLE_ABSENT: &str = "Service-linked role \
        'AWSServiceRoleForECS' does not exist. Please create the role before \
        creating a service.";
    const SAMPLE_ASSUME_FAILED: &str = "Unable to assume the service linked \
        role. Please verify that the ECS service linked role exists.";

    #[test]
    fn test_recorded_prerequisite_payloads_match() {
        assert_eq!(
            classify_failure(SAMPLE_IAM_DENIED),
            FailureClass::PrerequisiteMissing
        );
        assert_eq!(
            classify_failure(SAMPLE_ROLE_ABSENT),
            FailureClass::PrerequisiteMissing
        );
        assert_eq!(
            classify_failure(SAMPLE_ASSUME_FAILED),
            FailureClass::PrerequisiteMissing
        );
    }

    #[test]
    fn test_generic_failures_stay_generic() {
        assert_eq!(
            classify_failure("Resource creation cancelled: service quota exceeded"),
            FailureClass::Generic
        );
        assert_eq!(
            classify_failure("Embedded stack arn:...:stack/net was not successfully created"),
            FailureClass::Generic
        );
        assert_eq!(classify_failure(""), FailureClass::Generic);
    }
}
