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
//! Domain events and the session identity.

use std::sync::Arc;

use eyre::Result;
use tokio::sync::broadcast::Receiver;
use tracing_test::traced_test;

use idm::authentication::{AuthenticationStatus, IdmAuthenticator, SessionIdentity};
use idm::credential::{Credentials, Password, UsernamePasswordCredentials};
use idm::event::{BroadcastEventBridge, IdmEvent};
use idm::manager::{IdentityConfigurationBuilder, StoreConfiguration};
use idm::store::FileStoreConfiguration;
use idm::types::{IdentityType, Relationship};

use crate::common::bootstrap;

fn drain(rx: &mut Receiver<IdmEvent>) -> Vec<IdmEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

async fn setup() -> Result<(idm::PartitionManager, Arc<BroadcastEventBridge>, Receiver<IdmEvent>)> {
    let bridge = Arc::new(BroadcastEventBridge::new(64));
    let rx = bridge.subscribe();
    let pm = bootstrap(
        IdentityConfigurationBuilder::new()
            .named(
                "default",
                [StoreConfiguration::file(FileStoreConfiguration::default())],
            )
            .build()?,
        Some(bridge.clone()),
    )
    .await?;
    Ok((pm, bridge, rx))
}

#[tokio::test]
#[traced_test]
async fn test_store_events() -> Result<()> {
    let (pm, _bridge, mut rx) = setup().await?;
    assert!(matches!(
        drain(&mut rx).as_slice(),
        [IdmEvent::PartitionCreated(realm)] if realm.name == "default"
    ));

    let im = pm.create_identity_manager().await?;
    let john = im.add(IdentityType::user("john")).await?;
    let admin = im.add(IdentityType::role("admin")).await?;
    im.grant_role(&john, &admin).await?;
    im.update_credential(&john, &Password::new("secret")).await?;
    let events = drain(&mut rx);
    assert_eq!(IdmEvent::IdentityTypeCreated(john.clone()), events[0]);
    assert_eq!(IdmEvent::IdentityTypeCreated(admin.clone()), events[1]);
    assert!(matches!(
        &events[2],
        IdmEvent::RelationshipCreated(rel) if rel.references(&john.id) && rel.references(&admin.id)
    ));
    assert_eq!(
        IdmEvent::CredentialUpdated {
            identity_id: john.id.clone(),
            storage_type: "password".into(),
        },
        events[3]
    );

    im.remove(&john).await?;
    let events = drain(&mut rx);
    assert!(matches!(&events[0], IdmEvent::RelationshipDeleted(Relationship { .. })));
    assert_eq!(Some(&IdmEvent::IdentityTypeDeleted(john)), events.last());
    Ok(())
}

#[tokio::test]
#[traced_test]
async fn test_session_login() -> Result<()> {
    let (pm, bridge, mut rx) = setup().await?;
    let im = pm.create_identity_manager().await?;
    let john = im.add(IdentityType::user("john")).await?;
    im.update_credential(&john, &Password::new("secret")).await?;
    drain(&mut rx);

    let mut session = SessionIdentity::new(Arc::new(IdmAuthenticator::new(im.clone())), bridge);
    let mut wrong = Credentials::new(UsernamePasswordCredentials::new("john", "wrong"));
    assert_eq!(AuthenticationStatus::Failure, session.login(&mut wrong).await?);
    assert!(!session.is_logged_in());

    let mut credentials = Credentials::new(UsernamePasswordCredentials::new("john", "secret"));
    assert_eq!(AuthenticationStatus::Success, session.login(&mut credentials).await?);
    assert_eq!(Some(&john.id), session.agent().map(|agent| &agent.id));
    session.logout();

    let events = drain(&mut rx);
    assert_eq!(
        vec![
            IdmEvent::PreAuthenticate,
            IdmEvent::PostAuthenticate {
                status: AuthenticationStatus::Failure
            },
            IdmEvent::LoginFailed {
                reason: "Invalid".into()
            },
            IdmEvent::PreAuthenticate,
            IdmEvent::PostAuthenticate {
                status: AuthenticationStatus::Success
            },
        ],
        events[..5]
    );
    assert!(matches!(
        &events[5..],
        [
            IdmEvent::LoggedIn { .. },
            IdmEvent::PreLoggedOut { .. },
            IdmEvent::PostLoggedOut { .. }
        ]
    ));
    Ok(())
}
