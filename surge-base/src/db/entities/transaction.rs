use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "transactions")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub batch_id: String,
    pub account_address: String,
    pub operation_hash: Option<String>,
    pub sequence_number: i64,
    pub destination: String,
    pub value: String,
    pub fee_price: String,
    pub fee_limit: i64,
    pub status: String,
    pub submitted_at: DateTimeUtc,
    pub confirmed_at: Option<DateTimeUtc>,
    #[sea_orm(column_type = "Double")]
    pub latency_ms: f64,
    pub error: Option<String>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
