use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Transactions::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Transactions::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Transactions::BatchId).string().not_null())
                    .col(ColumnDef::new(Transactions::AccountAddress).string().not_null())
                    .col(ColumnDef::new(Transactions::OperationHash).string())
                    .col(
                        ColumnDef::new(Transactions::SequenceNumber)
                            .big_integer()
                            .not_null(),
                    )
                    .col(ColumnDef::new(Transactions::Destination).string().not_null())
                    .col(ColumnDef::new(Transactions::Value).string().not_null())
                    .col(ColumnDef::new(Transactions::FeePrice).string().not_null())
                    .col(ColumnDef::new(Transactions::FeeLimit).big_integer().not_null())
                    .col(ColumnDef::new(Transactions::Status).string().not_null())
                    .col(
                        ColumnDef::new(Transactions::SubmittedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(ColumnDef::new(Transactions::ConfirmedAt).timestamp_with_time_zone())
                    .col(
                        ColumnDef::new(Transactions::LatencyMs)
                            .double()
                            .not_null()
                            .default(0.0),
                    )
                    .col(ColumnDef::new(Transactions::Error).text())
                    .to_owned(),
            )
            .await?;

        for (name, column) in [
            ("idx_transactions_batch_id", Transactions::BatchId),
            ("idx_transactions_account_address", Transactions::AccountAddress),
            ("idx_transactions_operation_hash", Transactions::OperationHash),
            ("idx_transactions_status", Transactions::Status),
            ("idx_transactions_submitted_at", Transactions::SubmittedAt),
        ] {
            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .table(Transactions::Table)
                        .name(name)
                        .col(column)
                        .to_owned(),
                )
                .await?;
        }
        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Transactions::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
pub enum Transactions {
    Table,
    /// Unique database ID
    Id,
    /// Episode the transfer was submitted in
    BatchId,
    /// Sending account
    AccountAddress,
    /// Operation hash, null when submission failed
    OperationHash,
    /// Sequence number (nonce) the transfer was signed with
    SequenceNumber,
    /// Recipient
    Destination,
    /// Amount, decimal string
    Value,
    /// Fee price, decimal string
    FeePrice,
    /// Fee limit
    FeeLimit,
    /// pending | success | failed
    Status,
    SubmittedAt,
    ConfirmedAt,
    /// Submit latency while pending, end-to-end once confirmed
    LatencyMs,
    Error,
}
