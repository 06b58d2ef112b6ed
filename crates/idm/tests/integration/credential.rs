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
//! Credential validation across partitions.

use chrono::{TimeDelta, Utc};
use eyre::Result;
use secrecy::SecretString;
use tracing_test::traced_test;

use idm::credential::digest::{calculate_ha1, calculate_response};
use idm::credential::{
    CredentialStatus, Credentials, DIGEST, DigestChallenge, DigestCredentials, DigestPassword,
    PASSWORD, Password, TOTP, TotpCredentialHandler, TotpCredentials, TotpSecret,
    UsernamePasswordCredentials, X509, X509Certificate, X509CertificateCredentials,
};
use idm::types::{IdentityType, Partition};
use idm::{IdentityManagementError, IdentityManager};

use crate::common::get_file_manager;

// 20 bytes, base32 encoded.
const SECRET: &str = "JBSWY3DPEHPK3PXPJBSWY3DPEHPK3PXP";

async fn password_status(im: &IdentityManager, login_name: &str, password: &str) -> Result<CredentialStatus> {
    let mut credentials = Credentials::new(UsernamePasswordCredentials::new(login_name, password));
    im.validate_credentials(&mut credentials).await?;
    Ok(credentials.status())
}

fn totp(login_name: &str, password: &str, token: String, device: Option<&str>) -> Credentials {
    Credentials::new(TotpCredentials {
        username: login_name.into(),
        password: SecretString::from(password.to_string()),
        token,
        device: device.map(str::to_string),
    })
}

#[tokio::test]
#[traced_test]
async fn test_password_is_partition_bound() -> Result<()> {
    let pm = get_file_manager().await?;
    pm.add_partition(Partition::realm("Testing"), "default").await?;
    let default_manager = pm.create_identity_manager().await?;
    let testing = pm.for_realm("Testing").await?;

    let john = default_manager.add(IdentityType::user("john")).await?;
    default_manager
        .update_credential(&john, &Password::new("secret"))
        .await?;
    let other_john = testing.add(IdentityType::user("john")).await?;
    testing
        .update_credential(&other_john, &Password::new("other"))
        .await?;

    assert_eq!(CredentialStatus::Valid, password_status(&default_manager, "john", "secret").await?);
    assert_eq!(CredentialStatus::Invalid, password_status(&default_manager, "john", "other").await?);
    assert_eq!(CredentialStatus::Valid, password_status(&testing, "john", "other").await?);
    assert_eq!(CredentialStatus::Invalid, password_status(&testing, "john", "secret").await?);
    Ok(())
}

#[tokio::test]
#[traced_test]
async fn test_credential_history() -> Result<()> {
    let pm = get_file_manager().await?;
    let im = pm.create_identity_manager().await?;
    let john = im.add(IdentityType::user("john")).await?;
    let now = Utc::now();
    im.update_credential_with_dates(&john, &Password::new("first"), now - TimeDelta::days(10), None)
        .await?;
    im.update_credential_with_dates(&john, &Password::new("second"), now - TimeDelta::days(1), None)
        .await?;
    // Not effective yet.
    im.update_credential_with_dates(&john, &Password::new("third"), now + TimeDelta::days(1), None)
        .await?;

    let history = im.retrieve_credentials(&john, PASSWORD).await?;
    assert_eq!(3, history.len());
    assert!(history.windows(2).all(|w| w[0].effective_date <= w[1].effective_date));
    let current = im
        .retrieve_current_credential(&john, PASSWORD)
        .await?
        .expect("current password");
    assert_eq!(history[1].id, current.id);

    assert_eq!(CredentialStatus::Valid, password_status(&im, "john", "second").await?);
    assert_eq!(CredentialStatus::Invalid, password_status(&im, "john", "first").await?);
    assert_eq!(CredentialStatus::Invalid, password_status(&im, "john", "third").await?);

    let later = im.clone().with_reference_time(now + TimeDelta::days(2));
    assert_eq!(CredentialStatus::Valid, password_status(&later, "john", "third").await?);
    Ok(())
}

#[tokio::test]
#[traced_test]
async fn test_account_state() -> Result<()> {
    let pm = get_file_manager().await?;
    let im = pm.create_identity_manager().await?;
    let now = Utc::now();
    let john = im
        .add(IdentityType::user("john").with_expiration(now + TimeDelta::days(1)))
        .await?;
    im.update_credential(&john, &Password::new("secret")).await?;
    assert_eq!(CredentialStatus::Valid, password_status(&im, "john", "secret").await?);

    let later = im.clone().with_reference_time(now + TimeDelta::days(2));
    assert_eq!(CredentialStatus::AccountDisabled, password_status(&later, "john", "secret").await?);

    let john = im.update(john.with_enabled(false)).await?;
    assert_eq!(CredentialStatus::AccountDisabled, password_status(&im, "john", "secret").await?);
    im.update(john.with_enabled(true)).await?;
    assert_eq!(CredentialStatus::Valid, password_status(&im, "john", "secret").await?);
    assert_eq!(CredentialStatus::Invalid, password_status(&im, "nobody", "secret").await?);
    Ok(())
}

#[tokio::test]
#[traced_test]
async fn test_totp() -> Result<()> {
    let pm = get_file_manager().await?;
    let im = pm.create_identity_manager().await?;
    let john = im.add(IdentityType::user("john")).await?;
    im.update_credential(&john, &Password::new("secret")).await?;
    im.update_credential(
        &john,
        &TotpSecret {
            secret: SecretString::from(SECRET.to_string()),
            device: Some("phone".into()),
        },
    )
    .await?;
    assert_eq!(1, im.retrieve_credentials(&john, TOTP).await?.len());

    let token = TotpCredentialHandler::generate_token(SECRET, Utc::now())?;
    let mut credentials = totp("john", "secret", token.clone(), Some("phone"));
    im.validate_credentials(&mut credentials).await?;
    assert_eq!(CredentialStatus::Valid, credentials.status());
    assert_eq!(Some(&john.id), credentials.validated_agent().map(|a| &a.id));

    let mut wrong_password = totp("john", "wrong", token.clone(), Some("phone"));
    im.validate_credentials(&mut wrong_password).await?;
    assert_eq!(CredentialStatus::Invalid, wrong_password.status());

    let mut unknown_device = totp("john", "secret", token, None);
    im.validate_credentials(&mut unknown_device).await?;
    assert_eq!(CredentialStatus::Invalid, unknown_device.status());

    let stale = TotpCredentialHandler::generate_token(SECRET, Utc::now() - TimeDelta::hours(1))?;
    let mut stale = totp("john", "secret", stale, Some("phone"));
    im.validate_credentials(&mut stale).await?;
    assert_eq!(CredentialStatus::Invalid, stale.status());
    Ok(())
}

#[tokio::test]
#[traced_test]
async fn test_inherited_agent_credentials_are_read_only() -> Result<()> {
    let pm = get_file_manager().await?;
    let parent = pm
        .add_partition(Partition::tier("parent", None), "default")
        .await?;
    pm.add_partition(Partition::tier("child", Some(&parent)), "default")
        .await?;
    let parent_manager = pm.for_tier("parent").await?;
    let child_manager = pm.for_tier("child").await?;

    let john = parent_manager.add(IdentityType::user("john")).await?;
    assert_eq!(Some(john.clone()), child_manager.get_user("john").await?);
    assert!(matches!(
        child_manager
            .update_credential(&john, &Password::new("hijacked"))
            .await,
        Err(IdentityManagementError::IdentityTypeNotFound { .. })
    ));
    assert!(
        parent_manager
            .retrieve_credentials(&john, PASSWORD)
            .await?
            .is_empty()
    );

    parent_manager
        .update_credential(&john, &Password::new("secret"))
        .await?;
    assert_eq!(1, child_manager.retrieve_credentials(&john, PASSWORD).await?.len());
    assert_eq!(
        CredentialStatus::Valid,
        password_status(&parent_manager, "john", "secret").await?
    );
    Ok(())
}

#[tokio::test]
#[traced_test]
async fn test_digest() -> Result<()> {
    let pm = get_file_manager().await?;
    let im = pm.create_identity_manager().await?;
    let john = im.add(IdentityType::user("john")).await?;
    im.update_credential(&john, &DigestPassword::new("pl-idm", "secret"))
        .await?;
    let stored = im
        .retrieve_current_credential(&john, DIGEST)
        .await?
        .ok_or_else(|| eyre::eyre!("no digest stored"))?;
    assert_eq!(Some("pl-idm"), stored.field("realm"));

    let ha1 = calculate_ha1("john", "pl-idm", "secret");
    let mut credentials = Credentials::new(DigestCredentials::new("john", "pl-idm", &ha1));
    im.validate_credentials(&mut credentials).await?;
    assert_eq!(CredentialStatus::Valid, credentials.status());
    assert_eq!(Some(&john), credentials.validated_agent());

    let challenge = DigestChallenge {
        method: "GET".into(),
        uri: "/protected".into(),
        nonce: "b1d2c3".into(),
        nonce_count: "00000001".into(),
        client_nonce: "0a4f113b".into(),
        qop: "auth".into(),
    };
    let mut credentials = Credentials::new(
        DigestCredentials::new("john", "pl-idm", calculate_response(&ha1, &challenge))
            .with_challenge(challenge.clone()),
    );
    im.validate_credentials(&mut credentials).await?;
    assert_eq!(CredentialStatus::Valid, credentials.status());

    for (login_name, realm, password) in [
        ("john", "pl-idm", "bad_password"),
        ("Badjohn", "pl-idm", "secret"),
        ("john", "other", "secret"),
    ] {
        let mut credentials = Credentials::new(DigestCredentials::new(
            login_name,
            realm,
            calculate_ha1(login_name, realm, password),
        ));
        im.validate_credentials(&mut credentials).await?;
        assert_eq!(CredentialStatus::Invalid, credentials.status());
        assert!(credentials.validated_agent().is_none());
    }

    let now = Utc::now();
    im.update_credential_with_dates(
        &john,
        &DigestPassword::new("pl-idm", "changed"),
        now - TimeDelta::minutes(2),
        Some(now - TimeDelta::minutes(1)),
    )
    .await?;
    let mut credentials = Credentials::new(DigestCredentials::new(
        "john",
        "pl-idm",
        calculate_ha1("john", "pl-idm", "changed"),
    ));
    im.validate_credentials(&mut credentials).await?;
    // The expired record is older than the current one.
    assert_eq!(CredentialStatus::Invalid, credentials.status());
    Ok(())
}

#[tokio::test]
#[traced_test]
async fn test_x509_certificate() -> Result<()> {
    let pm = get_file_manager().await?;
    let im = pm.create_identity_manager().await?;
    let client_cert = vec![0x30, 0x82, 0x01, 0x0a, 0x02, 0x01, 0x01];
    let other_cert = vec![0x30, 0x82, 0x01, 0x0a, 0x02, 0x01, 0x02];
    let john = im.add(IdentityType::user("john")).await?;

    let validate = |certificate: Vec<u8>, trusted: bool| {
        let im = im.clone();
        async move {
            let mut credentials = Credentials::new(
                X509CertificateCredentials::new("john", certificate).trusted(trusted),
            );
            im.validate_credentials(&mut credentials).await?;
            Ok::<_, IdentityManagementError>(credentials.status())
        }
    };

    // Trusted certificates need no stored record.
    assert_eq!(CredentialStatus::Valid, validate(other_cert.clone(), true).await?);
    assert_eq!(CredentialStatus::Invalid, validate(client_cert.clone(), false).await?);

    let now = Utc::now();
    im.update_credential_with_dates(
        &john,
        &X509Certificate(client_cert.clone()),
        now - TimeDelta::minutes(2),
        Some(now - TimeDelta::minutes(1)),
    )
    .await?;
    assert_eq!(CredentialStatus::Expired, validate(client_cert.clone(), false).await?);

    im.update_credential(&john, &X509Certificate(client_cert.clone()))
        .await?;
    assert_eq!(CredentialStatus::Valid, validate(client_cert.clone(), false).await?);
    assert_eq!(CredentialStatus::Invalid, validate(other_cert, false).await?);
    assert!(im.retrieve_current_credential(&john, X509).await?.is_some());
    assert!(matches!(
        im.update_credential(&john, &X509Certificate(Vec::new())).await,
        Err(IdentityManagementError::InvalidArgument(_))
    ));

    im.update(john.with_enabled(false)).await?;
    assert_eq!(CredentialStatus::AccountDisabled, validate(client_cert, true).await?);
    Ok(())
}
