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
//! The engine on top of the SQL store.

use eyre::Result;
use tracing_test::traced_test;

use idm::IdentityManagementError;
use idm::credential::{CredentialStatus, Credentials, PASSWORD, Password, UsernamePasswordCredentials};
use idm::query::{IdentityParameter, IdentityQuery, RelationshipParameter, RelationshipQuery};
use idm::types::{IdentityType, IdentityTypeFilter, Partition, PartitionKind};

use crate::common::get_sql_manager;

#[tokio::test]
#[traced_test]
async fn test_partitions() -> Result<()> {
    let pm = get_sql_manager().await?;
    assert_eq!(1, pm.list_partitions(Some(PartitionKind::Realm)).await?.len());

    let testing = pm.add_partition(Partition::realm("Testing"), "default").await?;
    let application = pm
        .add_partition(Partition::tier("application", None), "default")
        .await?;
    let module = pm
        .add_partition(Partition::tier("module", Some(&application)), "default")
        .await?;
    assert_eq!(Some(application.id.clone()), module.parent_id);
    assert_eq!(
        Some(testing.clone()),
        pm.lookup_partition_by_id(&testing.id).await?
    );
    // The default realm, Testing and the two tiers.
    assert_eq!(4, pm.list_partitions(None).await?.len());
    assert_eq!(2, pm.list_partitions(Some(PartitionKind::Tier)).await?.len());

    let user = pm
        .for_realm("Testing")
        .await?
        .add(IdentityType::user("realmUser"))
        .await?;
    assert_eq!(testing.id, user.partition_id);
    assert!(
        pm.create_identity_manager()
            .await?
            .get_user("realmUser")
            .await?
            .is_none()
    );
    assert!(matches!(
        pm.remove_partition(&testing).await,
        Err(IdentityManagementError::PartitionNotEmpty { .. })
    ));
    Ok(())
}

#[tokio::test]
#[traced_test]
async fn test_identity_lifecycle() -> Result<()> {
    let pm = get_sql_manager().await?;
    let im = pm.create_identity_manager().await?;
    let john = im
        .add(
            IdentityType::user("john")
                .with_user_details(Some("John"), Some("Doe"), Some("john@example.com"))
                .with_attribute("level", 3_i64),
        )
        .await?;
    assert!(matches!(
        im.add(IdentityType::user("john")).await,
        Err(IdentityManagementError::IdentityTypeAlreadyExists { .. })
    ));
    let stored = im.get_user("john").await?.expect("stored user");
    assert_eq!(john.id, stored.id);
    assert_eq!(john.attributes, stored.attributes);

    let updated = im
        .update(stored.clone().with_attribute("level", 4_i64).with_enabled(false))
        .await?;
    assert!(!updated.enabled);
    assert_eq!(stored.created_at, updated.created_at);
    let found: Vec<String> = im
        .query(
            IdentityQuery::new(IdentityTypeFilter::User)
                .with_parameter(IdentityParameter::Email, "john@example.com")?,
        )
        .await?
        .into_iter()
        .map(|user| user.id)
        .collect();
    assert_eq!(vec![john.id.clone()], found);

    let org = im.add(IdentityType::group("org")).await?;
    let it = im.add(IdentityType::group_with_parent("it", &org)).await?;
    let admin = im.add(IdentityType::role("admin")).await?;
    im.add_to_group(&updated, &it).await?;
    im.grant_group_role(&updated, &org, &admin).await?;
    assert!(im.is_member(&updated, &org).await?);
    assert!(im.has_group_role(&updated, &it, &admin).await?);

    im.update_credential(&updated, &Password::new("secret")).await?;
    assert_eq!(1, im.retrieve_credentials(&updated, PASSWORD).await?.len());

    im.remove(&updated).await?;
    assert!(
        im.query_relationships(
            RelationshipQuery::any().with_parameter(RelationshipParameter::Identity, &updated)?
        )
        .await?
        .is_empty()
    );
    assert!(im.get_user("john").await?.is_none());
    assert!(im.get_group("/org/it").await?.is_some());
    Ok(())
}

#[tokio::test]
#[traced_test]
async fn test_password_validation() -> Result<()> {
    let pm = get_sql_manager().await?;
    let im = pm.create_identity_manager().await?;
    let john = im.add(IdentityType::user("john")).await?;
    im.update_credential(&john, &Password::new("secret")).await?;

    let mut credentials = Credentials::new(UsernamePasswordCredentials::new("john", "secret"));
    im.validate_credentials(&mut credentials).await?;
    assert_eq!(CredentialStatus::Valid, credentials.status());

    let mut credentials = Credentials::new(UsernamePasswordCredentials::new("john", "wrong"));
    im.validate_credentials(&mut credentials).await?;
    assert_eq!(CredentialStatus::Invalid, credentials.status());
    Ok(())
}
