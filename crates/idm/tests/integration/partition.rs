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
//! Partition isolation and tier visibility.

use eyre::Result;
use tracing_test::traced_test;

use idm::IdentityManagementError;
use idm::types::{IdentityType, IdentityTypeFilter, Partition, PartitionKind};

use crate::common::get_file_manager;

#[tokio::test]
#[traced_test]
async fn test_realm_user_invisible_from_default_realm() -> Result<()> {
    let pm = get_file_manager().await?;
    let testing = pm.add_partition(Partition::realm("Testing"), "default").await?;
    let realm_manager = pm.for_realm("Testing").await?;
    realm_manager.add(IdentityType::user("realmUser")).await?;

    assert!(pm.create_identity_manager().await?.get_user("realmUser").await?.is_none());
    let user = pm
        .for_realm("Testing")
        .await?
        .get_user("realmUser")
        .await?
        .expect("user in the realm");
    assert_eq!(testing.id, user.partition_id);
    Ok(())
}

#[tokio::test]
#[traced_test]
async fn test_same_login_name_in_two_realms() -> Result<()> {
    let pm = get_file_manager().await?;
    pm.add_partition(Partition::realm("Testing"), "default").await?;
    let default_user = pm
        .create_identity_manager()
        .await?
        .add(IdentityType::user("commonName"))
        .await?;
    let testing_user = pm
        .for_realm("Testing")
        .await?
        .add(IdentityType::user("commonName"))
        .await?;
    assert_ne!(default_user.id, testing_user.id);
    assert_ne!(default_user.partition_id, testing_user.partition_id);
    Ok(())
}

#[tokio::test]
#[traced_test]
async fn test_lookup_by_id_is_partition_bound() -> Result<()> {
    let pm = get_file_manager().await?;
    pm.add_partition(Partition::realm("Testing"), "default").await?;
    let default_manager = pm.create_identity_manager().await?;
    let user = default_manager.add(IdentityType::user("john")).await?;

    let testing = pm.for_realm("Testing").await?;
    assert!(
        testing
            .lookup_identity_by_id(IdentityTypeFilter::Any, &user.id)
            .await?
            .is_none()
    );
    // Mutations through a foreign partition are rejected.
    assert!(matches!(
        testing.remove(&user).await,
        Err(IdentityManagementError::IdentityTypeNotFound { .. })
    ));
    assert!(
        default_manager
            .lookup_identity_by_id(IdentityTypeFilter::User, &user.id)
            .await?
            .is_some()
    );
    Ok(())
}

#[tokio::test]
#[traced_test]
async fn test_tier_hierarchy_visibility() -> Result<()> {
    let pm = get_file_manager().await?;
    let application = pm
        .add_partition(Partition::tier("application", None), "default")
        .await?;
    pm.add_partition(Partition::tier("module", Some(&application)), "default")
        .await?;

    let parent = pm.for_tier("application").await?;
    let child = pm.for_tier("module").await?;
    let admin = parent.add(IdentityType::role("admin")).await?;
    child.add(IdentityType::role("reviewer")).await?;

    // Roles of the ancestors are visible, not the other way around.
    assert_eq!(Some(admin), child.get_role("admin").await?);
    assert!(child.get_role("reviewer").await?.is_some());
    assert!(parent.get_role("reviewer").await?.is_none());
    // Realms do not see tiers.
    assert!(
        pm.create_identity_manager()
            .await?
            .get_role("admin")
            .await?
            .is_none()
    );
    Ok(())
}

#[tokio::test]
#[traced_test]
async fn test_nearest_partition_wins() -> Result<()> {
    let pm = get_file_manager().await?;
    let application = pm
        .add_partition(Partition::tier("application", None), "default")
        .await?;
    let module = pm
        .add_partition(Partition::tier("module", Some(&application)), "default")
        .await?;

    pm.for_tier("application")
        .await?
        .add(IdentityType::role("admin"))
        .await?;
    pm.for_tier("module")
        .await?
        .add(IdentityType::role("admin"))
        .await?;

    let found = pm
        .for_tier("module")
        .await?
        .get_role("admin")
        .await?
        .expect("role visible in the tier");
    assert_eq!(module.id, found.partition_id);
    Ok(())
}

#[tokio::test]
#[traced_test]
async fn test_partition_removal() -> Result<()> {
    let pm = get_file_manager().await?;
    let application = pm
        .add_partition(Partition::tier("application", None), "default")
        .await?;
    let module = pm
        .add_partition(Partition::tier("module", Some(&application)), "default")
        .await?;
    assert!(matches!(
        pm.remove_partition(&application).await,
        Err(IdentityManagementError::PartitionHasChildren { .. })
    ));

    let im = pm.for_tier("module").await?;
    let role = im.add(IdentityType::role("admin")).await?;
    assert!(matches!(
        pm.remove_partition(&module).await,
        Err(IdentityManagementError::PartitionNotEmpty { identities: 1, .. })
    ));

    im.remove(&role).await?;
    pm.remove_partition(&module).await?;
    pm.remove_partition(&application).await?;
    assert!(pm.list_partitions(Some(PartitionKind::Tier)).await?.is_empty());
    assert!(matches!(
        pm.for_tier("module").await,
        Err(IdentityManagementError::PartitionNotFound(_))
    ));
    Ok(())
}

#[tokio::test]
#[traced_test]
async fn test_partition_names_are_unique_per_kind() -> Result<()> {
    let pm = get_file_manager().await?;
    pm.add_partition(Partition::realm("acme"), "default").await?;
    assert!(matches!(
        pm.add_partition(Partition::realm("acme"), "default").await,
        Err(IdentityManagementError::PartitionAlreadyExists { .. })
    ));
    // A tier may share the name of a realm.
    pm.add_partition(Partition::tier("acme", None), "default")
        .await?;
    assert!(matches!(
        pm.add_partition(Partition::realm("other"), "missing").await,
        Err(IdentityManagementError::Configuration { .. })
    ));
    Ok(())
}
