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
//! File store persistence across restarts.

use std::path::Path;

use eyre::Result;
use tempfile::tempdir;
use tracing_test::traced_test;

use idm::PartitionManager;
use idm::credential::{CredentialStatus, Credentials, Password, UsernamePasswordCredentials};
use idm::manager::{IdentityConfigurationBuilder, StoreConfiguration};
use idm::store::FileStoreConfigurationBuilder;
use idm::types::{IdentityType, Partition, PartitionKind};

use crate::common::bootstrap;

async fn start(dir: &Path, always_create_files: bool) -> Result<PartitionManager> {
    let config = FileStoreConfigurationBuilder::default()
        .working_dir(dir)
        .always_create_files(always_create_files)
        .build()?;
    bootstrap(
        IdentityConfigurationBuilder::new()
            .named("default", [StoreConfiguration::file(config)])
            .build()?,
        None,
    )
    .await
}

#[tokio::test]
#[traced_test]
async fn test_data_survives_restart() -> Result<()> {
    let dir = tempdir()?;
    {
        let pm = start(dir.path(), false).await?;
        pm.add_partition(Partition::realm("Testing"), "default").await?;
        let im = pm.for_realm("Testing").await?;
        let john = im.add(IdentityType::user("john")).await?;
        let admin = im.add(IdentityType::role("admin")).await?;
        im.grant_role(&john, &admin).await?;
        im.update_credential(&john, &Password::new("secret")).await?;
    }

    let pm = start(dir.path(), false).await?;
    assert_eq!(2, pm.list_partitions(Some(PartitionKind::Realm)).await?.len());
    let im = pm.for_realm("Testing").await?;
    let john = im.get_user("john").await?.expect("persisted user");
    let admin = im.get_role("admin").await?.expect("persisted role");
    assert!(im.has_role(&john, &admin).await?);
    let mut credentials = Credentials::new(UsernamePasswordCredentials::new("john", "secret"));
    im.validate_credentials(&mut credentials).await?;
    assert_eq!(CredentialStatus::Valid, credentials.status());
    Ok(())
}

#[tokio::test]
#[traced_test]
async fn test_always_create_files_discards_data() -> Result<()> {
    let dir = tempdir()?;
    {
        let pm = start(dir.path(), false).await?;
        pm.create_identity_manager()
            .await?
            .add(IdentityType::user("john"))
            .await?;
    }

    let pm = start(dir.path(), true).await?;
    assert!(
        pm.create_identity_manager()
            .await?
            .get_user("john")
            .await?
            .is_none()
    );
    // The default realm is created again.
    assert_eq!(1, pm.list_partitions(None).await?.len());
    Ok(())
}
