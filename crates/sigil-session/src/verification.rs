//! Verification methods
//!
//! The proofs a user can present to adopt an existing identity on a new
//! device, and the method descriptors the server advertises. The core only
//! formats these; the actual email/passphrase protocols live server-side.

use serde::{Deserialize, Serialize};

/// A proof of identity presented by the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verification {
    /// The printable verification-key token.
    VerificationKey(String),
    /// A passphrase registered with the server.
    Passphrase(String),
    /// An email address and the code sent to it.
    EmailCode {
        /// Address the code was sent to.
        email: String,
        /// The received code.
        code: String,
    },
}

impl Verification {
    /// The method this proof belongs to.
    pub fn method(&self) -> VerificationMethod {
        match self {
            Self::VerificationKey(_) => VerificationMethod::VerificationKey,
            Self::Passphrase(_) => VerificationMethod::Passphrase,
            Self::EmailCode { email, .. } => VerificationMethod::Email {
                email: email.clone(),
            },
        }
    }
}

/// A verification method registered with the server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum VerificationMethod {
    /// A verification key was generated for this user.
    VerificationKey,
    /// A passphrase is registered.
    Passphrase,
    /// An email address is registered.
    Email {
        /// The registered address.
        email: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_method_of_proof() {
        let proof = Verification::EmailCode {
            email: "alice@example.com".to_string(),
            code: "12345678".to_string(),
        };
        assert_eq!(
            proof.method(),
            VerificationMethod::Email {
                email: "alice@example.com".to_string()
            }
        );
    }

    #[test]
    fn test_method_serialization_is_tagged() {
        let method = VerificationMethod::Email {
            email: "a@b.c".to_string(),
        };
        let json = serde_json::to_string(&method).unwrap();
        assert!(json.contains("\"type\":\"email\""));
        let parsed: VerificationMethod = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, method);
    }
}
