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
//! Relationships and the cascading removal of identities.

use eyre::Result;
use tracing_test::traced_test;

use idm::IdentityManagementError;
use idm::query::{RelationshipParameter, RelationshipQuery};
use idm::types::{IdentityType, Partition, Relationship, RelationshipKind};

use crate::common::get_file_manager;

#[tokio::test]
#[traced_test]
async fn test_group_role_is_partition_bound() -> Result<()> {
    let pm = get_file_manager().await?;
    pm.add_partition(Partition::realm("Other"), "default").await?;
    let im = pm.create_identity_manager().await?;
    let user = im.add(IdentityType::user("john")).await?;
    let group = im.add(IdentityType::group("sales")).await?;
    let role = im.add(IdentityType::role("manager")).await?;

    im.grant_group_role(&user, &group, &role).await?;
    assert!(im.has_group_role(&user, &group, &role).await?);

    let other = pm.for_realm("Other").await?;
    assert!(!other.has_group_role(&user, &group, &role).await?);
    Ok(())
}

#[tokio::test]
#[traced_test]
async fn test_remove_identity_cascades() -> Result<()> {
    let pm = get_file_manager().await?;
    let im = pm.create_identity_manager().await?;
    let user = im.add(IdentityType::user("john")).await?;
    let group = im.add(IdentityType::group("sales")).await?;
    let role = im.add(IdentityType::role("manager")).await?;
    im.grant_role(&user, &role).await?;
    im.add_to_group(&user, &group).await?;
    im.grant_group_role(&user, &group, &role).await?;

    let referencing = |identity: &IdentityType| -> Result<RelationshipQuery> {
        Ok(RelationshipQuery::any().with_parameter(RelationshipParameter::Identity, identity)?)
    };
    assert_eq!(3, im.query_relationships(referencing(&user)?).await?.len());

    im.remove(&user).await?;
    assert!(im.query_relationships(referencing(&user)?).await?.is_empty());
    assert!(im.query_relationships(referencing(&role)?).await?.is_empty());
    assert!(im.get_group("sales").await?.is_some());
    Ok(())
}

#[tokio::test]
#[traced_test]
async fn test_group_hierarchy() -> Result<()> {
    let pm = get_file_manager().await?;
    let im = pm.create_identity_manager().await?;
    let org = im.add(IdentityType::group("org")).await?;
    let it = im.add(IdentityType::group_with_parent("it", &org)).await?;
    assert_eq!(Some("/org/it"), it.group_path());
    assert_eq!(Some(it.clone()), im.get_group("/org/it").await?);
    assert_eq!(Some(it.clone()), im.get_group_with_parent("it", &org).await?);

    let user = im.add(IdentityType::user("john")).await?;
    im.add_to_group(&user, &it).await?;
    // Adding twice keeps a single membership.
    im.add_to_group(&user, &it).await?;
    assert_eq!(
        1,
        im.query_relationships(RelationshipQuery::new(RelationshipKind::GroupMembership))
            .await?
            .len()
    );
    assert!(im.is_member(&user, &org).await?);

    assert!(matches!(
        im.remove(&org).await,
        Err(IdentityManagementError::InvalidArgument(_))
    ));
    im.remove_from_group(&user, &it).await?;
    assert!(!im.is_member(&user, &org).await?);
    Ok(())
}

#[tokio::test]
#[traced_test]
async fn test_custom_types() -> Result<()> {
    let pm = get_file_manager().await?;
    let im = pm.create_identity_manager().await?;
    let device = im
        .add(IdentityType::custom("Device").with_attribute("serial", "X-100"))
        .await?;
    let user = im.add(IdentityType::user("john")).await?;
    let owner = im
        .add_relationship(
            Relationship::new(RelationshipKind::Custom("DeviceOwner".into()))
                .with_identity("device", &device)
                .with_identity("owner", &user)
                .with_attribute("since", "2024"),
        )
        .await?;

    let found = im
        .query_relationships(
            RelationshipQuery::new(RelationshipKind::Custom("DeviceOwner".into()))
                .with_parameter(RelationshipParameter::Slot("owner".into()), &user)?,
        )
        .await?;
    assert_eq!(vec![owner.clone()], found);

    im.remove(&device).await?;
    assert!(
        im.query_relationships(RelationshipQuery::new(RelationshipKind::Custom(
            "DeviceOwner".into()
        )))
        .await?
        .is_empty()
    );
    Ok(())
}
