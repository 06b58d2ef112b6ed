// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//
// SPDX-License-Identifier: Apache-2.0

use std::any::Any;
use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};

use crate::error::IdentityManagementError;
use crate::types::IdentityType;

/// Type key of the username/password credential and its storage.
pub const PASSWORD: &str = "password";
/// Type key of the one time password credential and its storage.
pub const TOTP: &str = "totp";
/// Type key of the HTTP digest credential and its storage.
pub const DIGEST: &str = "digest";
/// Type key of the client certificate credential and its storage.
pub const X509: &str = "x509";

/// Credential presented for validation.
pub trait PresentedCredential: fmt::Debug + Send + Sync + 'static {
    /// Type key used to pick the credential handler.
    fn credential_type(&self) -> &'static str;

    fn as_any(&self) -> &dyn Any;
}

/// Credential value passed to the credential update.
pub trait CredentialValue: fmt::Debug + Send + Sync + 'static {
    /// Type key used to pick the credential handler.
    fn credential_type(&self) -> &'static str;

    fn as_any(&self) -> &dyn Any;
}

/// Outcome of the credential validation.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CredentialStatus {
    #[default]
    Unvalidated,
    InProgress,
    Valid,
    Invalid,
    Expired,
    AccountDisabled,
}

/// Presented credential together with the validation state.
#[derive(Debug)]
pub struct Credentials {
    credential: Box<dyn PresentedCredential>,
    status: CredentialStatus,
    validated_agent: Option<IdentityType>,
}

impl Credentials {
    pub fn new<C: PresentedCredential>(credential: C) -> Self {
        Self {
            credential: Box::new(credential),
            status: CredentialStatus::Unvalidated,
            validated_agent: None,
        }
    }

    pub fn credential_type(&self) -> &'static str {
        self.credential.credential_type()
    }

    /// Presented credential of the concrete type.
    pub fn credential<C: PresentedCredential>(&self) -> Option<&C> {
        self.credential.as_any().downcast_ref::<C>()
    }

    pub fn status(&self) -> CredentialStatus {
        self.status
    }

    pub fn set_status(&mut self, status: CredentialStatus) {
        self.status = status;
    }

    /// Agent the credentials have been validated for.
    pub fn validated_agent(&self) -> Option<&IdentityType> {
        self.validated_agent.as_ref()
    }

    pub fn set_validated_agent(&mut self, agent: Option<IdentityType>) {
        self.validated_agent = agent;
    }

    /// Reset the validation state.
    pub fn invalidate(&mut self) {
        self.status = CredentialStatus::Invalid;
        self.validated_agent = None;
    }
}

/// Username and password.
#[derive(Clone, Debug)]
pub struct UsernamePasswordCredentials {
    pub username: String,
    pub password: SecretString,
}

impl UsernamePasswordCredentials {
    pub fn new<U: Into<String>, P: Into<String>>(username: U, password: P) -> Self {
        Self {
            username: username.into(),
            password: SecretString::from(password.into()),
        }
    }
}

impl PresentedCredential for UsernamePasswordCredentials {
    fn credential_type(&self) -> &'static str {
        PASSWORD
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Username and password with a time based one time password.
#[derive(Clone, Debug)]
pub struct TotpCredentials {
    pub username: String,
    pub password: SecretString,
    pub token: String,
    /// Device the token is generated by. The default device when unset.
    pub device: Option<String>,
}

impl PresentedCredential for TotpCredentials {
    fn credential_type(&self) -> &'static str {
        TOTP
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// New password.
#[derive(Clone, Debug)]
pub struct Password(pub SecretString);

impl Password {
    pub fn new<S: Into<String>>(password: S) -> Self {
        Self(SecretString::from(password.into()))
    }
}

impl CredentialValue for Password {
    fn credential_type(&self) -> &'static str {
        PASSWORD
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Base32 encoded TOTP secret of a device.
#[derive(Clone, Debug)]
pub struct TotpSecret {
    pub secret: SecretString,
    pub device: Option<String>,
}

impl CredentialValue for TotpSecret {
    fn credential_type(&self) -> &'static str {
        TOTP
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Challenge parameters of an HTTP digest authentication with `qop`.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DigestChallenge {
    pub method: String,
    pub uri: String,
    pub nonce: String,
    pub nonce_count: String,
    pub client_nonce: String,
    pub qop: String,
}

/// HTTP digest presented by a client.
///
/// Without a challenge the response is the hex encoded HA1 of the user in the
/// realm. With a challenge it is the request digest computed from the HA1.
#[derive(Clone, Debug)]
pub struct DigestCredentials {
    pub username: String,
    pub realm: String,
    pub response: String,
    pub challenge: Option<DigestChallenge>,
}

impl DigestCredentials {
    pub fn new<U: Into<String>, R: Into<String>, D: Into<String>>(
        username: U,
        realm: R,
        response: D,
    ) -> Self {
        Self {
            username: username.into(),
            realm: realm.into(),
            response: response.into(),
            challenge: None,
        }
    }

    pub fn with_challenge(mut self, challenge: DigestChallenge) -> Self {
        self.challenge = Some(challenge);
        self
    }
}

impl PresentedCredential for DigestCredentials {
    fn credential_type(&self) -> &'static str {
        DIGEST
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// New password of the agent in a digest realm.
#[derive(Clone, Debug)]
pub struct DigestPassword {
    pub realm: String,
    pub password: SecretString,
}

impl DigestPassword {
    pub fn new<R: Into<String>, P: Into<String>>(realm: R, password: P) -> Self {
        Self {
            realm: realm.into(),
            password: SecretString::from(password.into()),
        }
    }
}

impl CredentialValue for DigestPassword {
    fn credential_type(&self) -> &'static str {
        DIGEST
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// DER encoded client certificate presented for the account.
///
/// The account name is the principal the transport mapped the certificate
/// to, usually the subject common name.
#[derive(Clone, Debug)]
pub struct X509CertificateCredentials {
    pub username: String,
    pub certificate: Vec<u8>,
    /// The transport already verified the certificate chain. Only the
    /// account is checked then.
    pub trusted: bool,
}

impl X509CertificateCredentials {
    pub fn new<U: Into<String>>(username: U, certificate: Vec<u8>) -> Self {
        Self {
            username: username.into(),
            certificate,
            trusted: false,
        }
    }

    pub fn trusted(mut self, trusted: bool) -> Self {
        self.trusted = trusted;
        self
    }
}

impl PresentedCredential for X509CertificateCredentials {
    fn credential_type(&self) -> &'static str {
        X509
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// DER encoded client certificate of the agent.
#[derive(Clone, Debug)]
pub struct X509Certificate(pub Vec<u8>);

impl CredentialValue for X509Certificate {
    fn credential_type(&self) -> &'static str {
        X509
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Persisted credential record.
///
/// Records are never modified once stored. Updating a credential appends a
/// new record to the history of the identity.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialStorage {
    pub id: String,
    pub identity_id: String,
    pub storage_type: String,
    pub effective_date: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expiry_date: Option<DateTime<Utc>>,
    /// Storage type specific fields.
    #[serde(default)]
    pub fields: BTreeMap<String, String>,
}

impl CredentialStorage {
    pub fn is_effective(&self, now: DateTime<Utc>) -> bool {
        self.effective_date <= now
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expiry_date.is_some_and(|exp| exp <= now)
    }

    /// Effective and not yet expired.
    pub fn is_current(&self, now: DateTime<Utc>) -> bool {
        self.is_effective(now) && !self.is_expired(now)
    }

    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(String::as_str)
    }

    fn required_field(&self, name: &str) -> Result<&str, IdentityManagementError> {
        self.field(name)
            .ok_or_else(|| IdentityManagementError::MalformedCredentialStorage {
                storage_type: self.storage_type.clone(),
                reason: format!("missing field {name}"),
            })
    }
}

/// Most recent record that is effective and not expired.
///
/// Records with the same effective date are resolved in favour of the one
/// stored last.
pub fn current_credential(
    history: &[CredentialStorage],
    now: DateTime<Utc>,
) -> Option<&CredentialStorage> {
    history
        .iter()
        .filter(|rec| rec.is_current(now))
        .max_by_key(|rec| rec.effective_date)
}

/// Most recent record that is effective, expired or not.
pub fn latest_effective_credential(
    history: &[CredentialStorage],
    now: DateTime<Utc>,
) -> Option<&CredentialStorage> {
    history
        .iter()
        .filter(|rec| rec.is_effective(now))
        .max_by_key(|rec| rec.effective_date)
}

/// Stored password hash.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EncodedPasswordStorage {
    pub encoded_hash: String,
    pub salt: String,
}

impl EncodedPasswordStorage {
    pub fn into_fields(self) -> BTreeMap<String, String> {
        BTreeMap::from([
            ("encoded_hash".to_string(), self.encoded_hash),
            ("salt".to_string(), self.salt),
        ])
    }
}

impl TryFrom<&CredentialStorage> for EncodedPasswordStorage {
    type Error = IdentityManagementError;

    fn try_from(value: &CredentialStorage) -> Result<Self, Self::Error> {
        Ok(Self {
            encoded_hash: value.required_field("encoded_hash")?.to_string(),
            salt: value.required_field("salt")?.to_string(),
        })
    }
}

/// Stored TOTP secret.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TotpStorage {
    pub secret: String,
    pub device: String,
}

impl TotpStorage {
    pub fn into_fields(self) -> BTreeMap<String, String> {
        BTreeMap::from([
            ("secret".to_string(), self.secret),
            ("device".to_string(), self.device),
        ])
    }
}

impl TryFrom<&CredentialStorage> for TotpStorage {
    type Error = IdentityManagementError;

    fn try_from(value: &CredentialStorage) -> Result<Self, Self::Error> {
        Ok(Self {
            secret: value.required_field("secret")?.to_string(),
            device: value.field("device").unwrap_or_default().to_string(),
        })
    }
}

/// Stored HA1 of the agent in a digest realm.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DigestStorage {
    pub ha1: String,
    pub realm: String,
}

impl DigestStorage {
    pub fn into_fields(self) -> BTreeMap<String, String> {
        BTreeMap::from([
            ("ha1".to_string(), self.ha1),
            ("realm".to_string(), self.realm),
        ])
    }
}

impl TryFrom<&CredentialStorage> for DigestStorage {
    type Error = IdentityManagementError;

    fn try_from(value: &CredentialStorage) -> Result<Self, Self::Error> {
        Ok(Self {
            ha1: value.required_field("ha1")?.to_string(),
            realm: value.required_field("realm")?.to_string(),
        })
    }
}

/// Stored client certificate, base64 encoded DER.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct X509CertificateStorage {
    pub base64_cert: String,
}

impl X509CertificateStorage {
    pub fn into_fields(self) -> BTreeMap<String, String> {
        BTreeMap::from([("base64_cert".to_string(), self.base64_cert)])
    }
}

impl TryFrom<&CredentialStorage> for X509CertificateStorage {
    type Error = IdentityManagementError;

    fn try_from(value: &CredentialStorage) -> Result<Self, Self::Error> {
        Ok(Self {
            base64_cert: value.required_field("base64_cert")?.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeDelta;

    use super::*;

    fn record(id: &str, effective: DateTime<Utc>, expiry: Option<DateTime<Utc>>) -> CredentialStorage {
        CredentialStorage {
            id: id.into(),
            identity_id: "uid".into(),
            storage_type: PASSWORD.into(),
            effective_date: effective,
            expiry_date: expiry,
            fields: BTreeMap::new(),
        }
    }

    #[test]
    fn test_current_credential() {
        let now = Utc::now();
        let history = vec![
            record("old", now - TimeDelta::days(10), None),
            record("expired", now - TimeDelta::days(5), Some(now - TimeDelta::days(1))),
            record("future", now + TimeDelta::days(1), None),
        ];
        assert_eq!("old", current_credential(&history, now).unwrap().id);
        assert_eq!(
            "expired",
            latest_effective_credential(&history, now).unwrap().id
        );
        assert!(current_credential(&history[1..], now).is_none());
        assert!(current_credential(&[], now).is_none());
    }

    #[test]
    fn test_current_credential_same_effective_date() {
        let now = Utc::now();
        let effective = now - TimeDelta::seconds(1);
        let history = vec![record("first", effective, None), record("second", effective, None)];
        assert_eq!("second", current_credential(&history, now).unwrap().id);
    }

    #[test]
    fn test_password_storage_fields() {
        let now = Utc::now();
        let mut rec = record("1", now, None);
        assert!(EncodedPasswordStorage::try_from(&rec).is_err());
        rec.fields = EncodedPasswordStorage {
            encoded_hash: "hash".into(),
            salt: "salt".into(),
        }
        .into_fields();
        let sot = EncodedPasswordStorage::try_from(&rec).unwrap();
        assert_eq!("hash", sot.encoded_hash);
        assert_eq!("salt", sot.salt);
    }

    #[test]
    fn test_credentials_downcast() {
        let creds = Credentials::new(UsernamePasswordCredentials::new("john", "secret"));
        assert_eq!(PASSWORD, creds.credential_type());
        assert!(creds.credential::<UsernamePasswordCredentials>().is_some());
        assert!(creds.credential::<TotpCredentials>().is_none());
        assert_eq!(CredentialStatus::Unvalidated, creds.status());
    }
}
