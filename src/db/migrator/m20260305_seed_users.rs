use crate::entities::prelude::*;
use crate::entities::users;
use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

/// Bootstrap accounts: (email, password, full name, role).
const SEED_USERS: [(&str, &str, &str, &str); 3] = [
    ("admin@customer360.com", "Admin@123", "Admin User", "admin"),
    (
        "support@customer360.com",
        "Support@123",
        "Support Engineer",
        "support_engineer",
    ),
    ("viewer@customer360.com", "Viewer@123", "Viewer User", "viewer"),
];

/// Hash a seed password using Argon2id
fn hash_seed_password(password: &str) -> String {
    use argon2::{
        Argon2,
        password_hash::{PasswordHasher, SaltString, rand_core::OsRng},
    };

    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();

    argon2
        .hash_password(password.as_bytes(), &salt)
        .expect("Failed to hash seed password")
        .to_string()
}

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let now = chrono::Utc::now().to_rfc3339();

        for (email, password, full_name, role) in SEED_USERS {
            let insert = sea_orm_migration::sea_query::Query::insert()
                .into_table(Users)
                .columns([
                    users::Column::Email,
                    users::Column::PasswordHash,
                    users::Column::FullName,
                    users::Column::Role,
                    users::Column::IsActive,
                    users::Column::CreatedAt,
                    users::Column::UpdatedAt,
                ])
                .values_panic([
                    email.into(),
                    hash_seed_password(password).into(),
                    full_name.into(),
                    role.into(),
                    true.into(),
                    now.clone().into(),
                    now.clone().into(),
                ])
                .to_owned();

            manager.exec_stmt(insert).await?;
        }

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        for (email, _, _, _) in SEED_USERS {
            let delete = sea_orm_migration::sea_query::Query::delete()
                .from_table(Users)
                .and_where(Expr::col(users::Column::Email).eq(email))
                .to_owned();

            manager.exec_stmt(delete).await?;
        }

        Ok(())
    }
}
