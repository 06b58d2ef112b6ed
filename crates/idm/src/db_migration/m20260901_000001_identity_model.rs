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

use sea_orm_migration::{prelude::*, schema::*};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Partition::Table)
                    .if_not_exists()
                    .col(string_len(Partition::Id, 64).primary_key())
                    .col(string_len(Partition::Name, 255))
                    .col(string_len(Partition::Kind, 16))
                    .col(string_len_null(Partition::ParentId, 64))
                    .col(string_len(Partition::ConfigurationName, 255))
                    .col(json_null(Partition::Attributes))
                    .to_owned(),
            )
            .await?;
        manager
            .create_index(
                Index::create()
                    .name("idx-partition-kind-name")
                    .table(Partition::Table)
                    .col(Partition::Kind)
                    .col(Partition::Name)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(IdentityType::Table)
                    .if_not_exists()
                    .col(string_len(IdentityType::Id, 64).primary_key())
                    .col(string_len(IdentityType::PartitionId, 64))
                    .col(string_len(IdentityType::TypeName, 255))
                    .col(string_len(IdentityType::KeySpace, 16))
                    .col(string_len_null(IdentityType::NaturalKey, 1024))
                    .col(boolean(IdentityType::Enabled))
                    .col(timestamp_with_time_zone(IdentityType::CreatedAt))
                    .col(timestamp_with_time_zone_null(IdentityType::ExpiresAt))
                    .col(json(IdentityType::Kind))
                    .col(json_null(IdentityType::Attributes))
                    .to_owned(),
            )
            .await?;
        manager
            .create_index(
                Index::create()
                    .name("idx-identity-type-natural-key")
                    .table(IdentityType::Table)
                    .col(IdentityType::PartitionId)
                    .col(IdentityType::KeySpace)
                    .col(IdentityType::NaturalKey)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Relationship::Table)
                    .if_not_exists()
                    .col(string_len(Relationship::Id, 64).primary_key())
                    .col(string_len(Relationship::PartitionId, 64))
                    .col(string_len(Relationship::Kind, 255))
                    .col(json_null(Relationship::Attributes))
                    .to_owned(),
            )
            .await?;
        manager
            .create_table(
                Table::create()
                    .table(RelationshipIdentity::Table)
                    .if_not_exists()
                    .col(string_len(RelationshipIdentity::RelationshipId, 64))
                    .col(string_len(RelationshipIdentity::Descriptor, 64))
                    .col(string_len(RelationshipIdentity::IdentityId, 64))
                    .primary_key(
                        Index::create()
                            .name("pk-relationship-identity")
                            .col(RelationshipIdentity::RelationshipId)
                            .col(RelationshipIdentity::Descriptor),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-relationship-identity-relationship")
                            .from(
                                RelationshipIdentity::Table,
                                RelationshipIdentity::RelationshipId,
                            )
                            .to(Relationship::Table, Relationship::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;
        manager
            .create_index(
                Index::create()
                    .name("idx-relationship-identity-identity")
                    .table(RelationshipIdentity::Table)
                    .col(RelationshipIdentity::IdentityId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Credential::Table)
                    .if_not_exists()
                    .col(string_len(Credential::Id, 64).primary_key())
                    .col(string_len(Credential::IdentityId, 64))
                    .col(string_len(Credential::StorageType, 64))
                    .col(timestamp_with_time_zone(Credential::EffectiveDate))
                    .col(timestamp_with_time_zone_null(Credential::ExpiryDate))
                    .col(json(Credential::Fields))
                    .col(big_integer(Credential::Seq))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-credential-identity-type")
                            .from(Credential::Table, Credential::IdentityId)
                            .to(IdentityType::Table, IdentityType::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;
        manager
            .create_index(
                Index::create()
                    .name("idx-credential-identity-type")
                    .table(Credential::Table)
                    .col(Credential::IdentityId)
                    .col(Credential::StorageType)
                    .to_owned(),
            )
            .await?;
        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Credential::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(RelationshipIdentity::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Relationship::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(IdentityType::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Partition::Table).to_owned())
            .await?;
        Ok(())
    }
}

#[derive(DeriveIden)]
enum Partition {
    Table,
    Id,
    Name,
    Kind,
    ParentId,
    ConfigurationName,
    Attributes,
}

#[derive(DeriveIden)]
enum IdentityType {
    Table,
    Id,
    PartitionId,
    TypeName,
    KeySpace,
    NaturalKey,
    Enabled,
    CreatedAt,
    ExpiresAt,
    Kind,
    Attributes,
}

#[derive(DeriveIden)]
enum Relationship {
    Table,
    Id,
    PartitionId,
    Kind,
    Attributes,
}

#[derive(DeriveIden)]
enum RelationshipIdentity {
    Table,
    RelationshipId,
    Descriptor,
    IdentityId,
}

#[derive(DeriveIden)]
enum Credential {
    Table,
    Id,
    IdentityId,
    StorageType,
    EffectiveDate,
    ExpiryDate,
    Fields,
    Seq,
}
