use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "tickets")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    pub customer_id: i32,

    pub assigned_engineer_id: Option<i32>,

    pub title: String,

    pub description: String,

    /// One of: low, medium, high, critical
    pub priority: String,

    pub severity: String,

    /// One of: open, in_progress, resolved, closed
    pub status: String,

    pub resolution_notes: Option<String>,

    /// Stamped on the first transition to resolved, never overwritten.
    pub resolved_at: Option<String>,

    pub closed_at: Option<String>,

    pub created_at: String,

    pub updated_at: String,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::customers::Entity",
        from = "Column::CustomerId",
        to = "super::customers::Column::Id",
        on_update = "NoAction",
        on_delete = "Cascade"
    )]
    Customers,
    #[sea_orm(
        belongs_to = "super::users::Entity",
        from = "Column::AssignedEngineerId",
        to = "super::users::Column::Id",
        on_update = "NoAction",
        on_delete = "NoAction"
    )]
    Users,
    #[sea_orm(has_many = "super::ticket_comments::Entity")]
    TicketComments,
}

impl Related<super::customers::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Customers.def()
    }
}

impl Related<super::users::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Users.def()
    }
}

impl Related<super::ticket_comments::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::TicketComments.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
