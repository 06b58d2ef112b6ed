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
//! Identity queries and the dispatch of operations to the stores.

use std::sync::Arc;

use async_trait::async_trait;
use eyre::Result;
use tracing_test::traced_test;

use idm::IdentityManagementError;
use idm::credential::{CredentialStatus, Credentials, PASSWORD, Password, UsernamePasswordCredentials};
use idm::feature::{FeatureGroup, FeatureSet, FeatureSetBuilder};
use idm::manager::{IdentityConfigurationBuilder, StoreConfiguration};
use idm::query::{IdentityParameter, IdentityQuery, RelationshipQuery, SortField};
use idm::store::{
    FileIdentityStore, FileStoreConfiguration, IdentityStore, InvocationContext,
    PartitionReferences,
};
use idm::types::{IdentityType, IdentityTypeFilter, RelationshipKind};

use crate::common::{bootstrap, get_file_manager};

fn features(groups: &[FeatureGroup]) -> Result<FeatureSet> {
    let mut builder = FeatureSetBuilder::new();
    builder.add_feature_support(groups)?;
    Ok(builder.build())
}

fn store(groups: &[FeatureGroup]) -> Result<StoreConfiguration> {
    Ok(StoreConfiguration::file(FileStoreConfiguration::default()).with_features(features(groups)?))
}

fn login_names(identities: &[IdentityType]) -> Vec<&str> {
    identities.iter().filter_map(|i| i.login_name()).collect()
}

#[tokio::test]
#[traced_test]
async fn test_relational_queries() -> Result<()> {
    let pm = get_file_manager().await?;
    let im = pm.create_identity_manager().await?;
    let alice = im.add(IdentityType::user("alice")).await?;
    let bob = im.add(IdentityType::user("bob")).await?;
    let carol = im.add(IdentityType::user("carol")).await?;
    let sales = im.add(IdentityType::group("sales")).await?;
    let admin = im.add(IdentityType::role("admin")).await?;
    let auditor = im.add(IdentityType::role("auditor")).await?;

    im.add_to_group(&alice, &sales).await?;
    im.add_to_group(&bob, &sales).await?;
    im.grant_role(&bob, &admin).await?;
    im.grant_role(&carol, &auditor).await?;
    im.grant_role(&bob, &auditor).await?;

    let members = im
        .query(
            IdentityQuery::new(IdentityTypeFilter::User)
                .with_parameter(IdentityParameter::MemberOf, &sales)?
                .sort_by(SortField::Key, true),
        )
        .await?;
    assert_eq!(vec!["alice", "bob"], login_names(&members));

    // Both relational constraints apply.
    let sales_auditors = im
        .query(
            IdentityQuery::new(IdentityTypeFilter::User)
                .with_parameter(IdentityParameter::MemberOf, &sales)?
                .with_parameter(IdentityParameter::HasRole, &auditor)?,
        )
        .await?;
    assert_eq!(vec!["bob"], login_names(&sales_auditors));

    let roles_of_bob = im
        .query(
            IdentityQuery::new(IdentityTypeFilter::Role)
                .with_parameter(IdentityParameter::RoleOf, &bob)?
                .sort_by(SortField::Key, false),
        )
        .await?;
    assert_eq!(
        vec![Some("auditor"), Some("admin")],
        roles_of_bob.iter().map(|r| r.name()).collect::<Vec<_>>()
    );

    let groups_of_alice = im
        .query(
            IdentityQuery::new(IdentityTypeFilter::Group)
                .with_parameter(IdentityParameter::HasMember, &alice)?,
        )
        .await?;
    assert_eq!(vec![sales.clone()], groups_of_alice);

    assert!(
        im.query(
            IdentityQuery::new(IdentityTypeFilter::Group)
                .with_parameter(IdentityParameter::HasMember, &carol)?
        )
        .await?
        .is_empty()
    );
    Ok(())
}

#[tokio::test]
#[traced_test]
async fn test_attribute_query_and_pagination() -> Result<()> {
    let pm = get_file_manager().await?;
    let im = pm.create_identity_manager().await?;
    for (name, team) in [("dan", "red"), ("eve", "blue"), ("fay", "red"), ("gus", "red")] {
        im.add(IdentityType::user(name).with_attribute("team", team))
            .await?;
    }

    let red = IdentityQuery::new(IdentityTypeFilter::User)
        .with_parameter(IdentityParameter::Attribute("team".into()), "red")?
        .sort_by(SortField::Key, true);
    assert_eq!(3, im.count(red.clone()).await?);
    let page = im.query(red.clone().paginate(1, Some(1))).await?;
    assert_eq!(vec!["fay"], login_names(&page));
    assert_eq!(3, im.count(red.paginate(2, Some(1))).await?);

    let disabled = IdentityQuery::new(IdentityTypeFilter::Agent)
        .with_parameter(IdentityParameter::Enabled, false)?;
    assert_eq!(0, im.count(disabled).await?);
    Ok(())
}

#[tokio::test]
async fn test_invalid_query_parameters() {
    assert!(matches!(
        IdentityQuery::new(IdentityTypeFilter::Role)
            .with_parameter(IdentityParameter::LoginName, "john"),
        Err(IdentityManagementError::UnsupportedQueryParameter { .. })
    ));
    assert!(matches!(
        IdentityQuery::new(IdentityTypeFilter::User)
            .with_parameter(IdentityParameter::HasRole, IdentityType::group("sales")),
        Err(IdentityManagementError::UnsupportedQueryParameterValue { .. })
    ));
    assert!(matches!(
        IdentityQuery::new(IdentityTypeFilter::User)
            .set_parameter(IdentityParameter::LoginName, Vec::<String>::new()),
        Err(IdentityManagementError::NullArgument(_))
    ));
}

#[tokio::test]
#[traced_test]
async fn test_split_configuration() -> Result<()> {
    let pm = bootstrap(
        IdentityConfigurationBuilder::new()
            .named(
                "default",
                [
                    store(&[
                        FeatureGroup::Realm,
                        FeatureGroup::Tier,
                        FeatureGroup::Agent,
                        FeatureGroup::User,
                        FeatureGroup::Credential,
                        FeatureGroup::Relationship,
                    ])?,
                    store(&[FeatureGroup::Group, FeatureGroup::Role])?,
                ],
            )
            .build()?,
        None,
    )
    .await?;
    let im = pm.create_identity_manager().await?;
    let john = im.add(IdentityType::user("john")).await?;
    let admin = im.add(IdentityType::role("admin")).await?;
    im.grant_role(&john, &admin).await?;
    assert!(im.has_role(&john, &admin).await?);

    let everyone = im.count(IdentityQuery::new(IdentityTypeFilter::Any)).await?;
    assert_eq!(2, everyone);

    // The grant lives in another store than the role.
    im.remove(&admin).await?;
    assert!(
        im.query_relationships(RelationshipQuery::new(RelationshipKind::Grant))
            .await?
            .is_empty()
    );
    Ok(())
}

#[tokio::test]
#[traced_test]
async fn test_unsupported_operations() -> Result<()> {
    let pm = bootstrap(
        IdentityConfigurationBuilder::new()
            .named(
                "default",
                [store(&[
                    FeatureGroup::Realm,
                    FeatureGroup::User,
                    FeatureGroup::Role,
                ])?],
            )
            .build()?,
        None,
    )
    .await?;
    let im = pm.create_identity_manager().await?;
    assert!(matches!(
        im.add(IdentityType::group("sales")).await,
        Err(IdentityManagementError::UnsupportedIdentityType { .. })
    ));
    let john = im.add(IdentityType::user("john")).await?;
    let admin = im.add(IdentityType::role("admin")).await?;
    assert!(matches!(
        im.grant_role(&john, &admin).await,
        Err(IdentityManagementError::UnsupportedRelationshipType { .. })
    ));
    assert!(matches!(
        im.retrieve_credentials(&john, idm::credential::PASSWORD).await,
        Err(IdentityManagementError::UnsupportedIdentityType { .. })
    ));
    assert!(matches!(
        pm.add_partition(idm::types::Partition::tier("app", None), "default")
            .await,
        Err(IdentityManagementError::UnsupportedIdentityType { .. })
    ));
    Ok(())
}

#[tokio::test]
#[traced_test]
async fn test_credentials_in_separate_store() -> Result<()> {
    let pm = bootstrap(
        IdentityConfigurationBuilder::new()
            .named(
                "default",
                [
                    store(&[FeatureGroup::Realm, FeatureGroup::Agent, FeatureGroup::User])?,
                    store(&[FeatureGroup::Credential])?,
                ],
            )
            .build()?,
        None,
    )
    .await?;
    let im = pm.create_identity_manager().await?;
    let john = im.add(IdentityType::user("john")).await?;
    im.update_credential(&john, &Password::new("secret")).await?;
    assert_eq!(1, im.retrieve_credentials(&john, PASSWORD).await?.len());

    let mut credentials = Credentials::new(UsernamePasswordCredentials::new("john", "secret"));
    im.validate_credentials(&mut credentials).await?;
    assert_eq!(CredentialStatus::Valid, credentials.status());
    assert_eq!(Some(&john), credentials.validated_agent());

    let mut credentials = Credentials::new(UsernamePasswordCredentials::new("john", "wrong"));
    im.validate_credentials(&mut credentials).await?;
    assert_eq!(CredentialStatus::Invalid, credentials.status());
    Ok(())
}

/// File store refusing to remove identities.
#[derive(Debug)]
struct FailingRemoval(FileIdentityStore);

#[async_trait]
impl IdentityStore for FailingRemoval {
    fn driver(&self) -> &str {
        "failing"
    }

    async fn setup(&self) -> Result<(), IdentityManagementError> {
        self.0.setup().await
    }

    async fn add_identity(
        &self,
        ctx: &InvocationContext,
        identity: IdentityType,
    ) -> Result<IdentityType, IdentityManagementError> {
        self.0.add_identity(ctx, identity).await
    }

    async fn update_identity(
        &self,
        ctx: &InvocationContext,
        identity: IdentityType,
    ) -> Result<IdentityType, IdentityManagementError> {
        self.0.update_identity(ctx, identity).await
    }

    async fn remove_identity(
        &self,
        _ctx: &InvocationContext,
        identity: &IdentityType,
    ) -> Result<(), IdentityManagementError> {
        Err(IdentityManagementError::Store(format!(
            "removal of {} refused",
            identity.id
        )))
    }

    async fn get_identity(
        &self,
        ctx: &InvocationContext,
        id: &str,
    ) -> Result<Option<IdentityType>, IdentityManagementError> {
        self.0.get_identity(ctx, id).await
    }

    async fn query_identities(
        &self,
        ctx: &InvocationContext,
        query: &IdentityQuery,
    ) -> Result<Vec<IdentityType>, IdentityManagementError> {
        self.0.query_identities(ctx, query).await
    }

    async fn partition_references(
        &self,
        partition_id: &str,
    ) -> Result<PartitionReferences, IdentityManagementError> {
        self.0.partition_references(partition_id).await
    }
}

#[tokio::test]
#[traced_test]
async fn test_failed_removal_keeps_references() -> Result<()> {
    let failing = FailingRemoval(FileIdentityStore::new(FileStoreConfiguration::default()));
    let pm = bootstrap(
        IdentityConfigurationBuilder::new()
            .named(
                "default",
                [
                    StoreConfiguration::custom("failing", Arc::new(failing)).with_features(
                        features(&[FeatureGroup::Agent, FeatureGroup::User, FeatureGroup::Role])?,
                    ),
                    store(&[
                        FeatureGroup::Realm,
                        FeatureGroup::Credential,
                        FeatureGroup::Relationship,
                    ])?,
                ],
            )
            .build()?,
        None,
    )
    .await?;
    let im = pm.create_identity_manager().await?;
    let john = im.add(IdentityType::user("john")).await?;
    let admin = im.add(IdentityType::role("admin")).await?;
    im.grant_role(&john, &admin).await?;
    im.update_credential(&john, &Password::new("secret")).await?;

    assert!(matches!(
        im.remove(&john).await,
        Err(IdentityManagementError::Store(_))
    ));
    assert_eq!(Some(john.clone()), im.get_user("john").await?);
    assert!(im.has_role(&john, &admin).await?);
    assert_eq!(1, im.retrieve_credentials(&john, PASSWORD).await?.len());
    Ok(())
}
