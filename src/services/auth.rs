use subtle::ConstantTimeEq;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthDecision {
    Authorized,
    Unauthorized,
}

/// Shared-secret check for upload requests.
///
/// Without a configured secret the gate is closed: every presented
/// credential, including the empty string, is rejected.
#[derive(Clone)]
pub struct AuthGate {
    expected: Option<String>,
}

impl AuthGate {
    pub fn new(expected: Option<String>) -> Self {
        Self {
            expected: expected.filter(|t| !t.is_empty()),
        }
    }

    pub fn is_configured(&self) -> bool {
        self.expected.is_some()
    }

    pub fn verify(&self, presented: Option<&str>) -> AuthDecision {
        let (Some(expected), Some(presented)) = (self.expected.as_deref(), presented) else {
            return AuthDecision::Unauthorized;
        };

        // ct_eq on slices of different lengths is false without touching content
        if bool::from(expected.as_bytes().ct_eq(presented.as_bytes())) {
            AuthDecision::Authorized
        } else {
            AuthDecision::Unauthorized
        }
    }
}

impl std::fmt::Debug for AuthGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthGate")
            .field("configured", &self.is_configured())
            .finish()
    }
}
