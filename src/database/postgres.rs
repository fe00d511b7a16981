use std::collections::HashMap;

use async_trait::async_trait;
use sqlx::{FromRow, PgPool, Postgres, Transaction};
use tracing::debug;

use crate::database::repository::{UserQuery, UserRepository};
use crate::error::Result;
use crate::models::permission::Permission;
use crate::models::role::Role;
use crate::models::user::{NewUser, User, UserRow};

const USER_COLUMNS: &str =
    "id, name, email, password, profile_image, faculty, is_active, created_at, updated_at";

#[derive(Debug, FromRow)]
struct UserRoleRow {
    user_id: i64,
    id: i64,
    name: String,
    description: Option<String>,
}

#[derive(Debug, FromRow)]
struct RolePermissionRow {
    role_id: i64,
    id: i64,
    name: String,
    description: Option<String>,
}

/// PostgreSQL-backed implementation of [`UserRepository`].
#[derive(Clone, Debug)]
pub struct PgUserRepository {
    pool: PgPool,
}

impl PgUserRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn roles_for_users(&self, user_ids: &[i64]) -> Result<HashMap<i64, Vec<Role>>> {
        let rows = sqlx::query_as::<_, UserRoleRow>(
            r#"
            SELECT ur.user_id, r.id, r.name, r.description
            FROM user_roles ur
            JOIN roles r ON r.id = ur.role_id
            WHERE ur.user_id = ANY($1)
            ORDER BY r.id
            "#,
        )
        .bind(user_ids)
        .fetch_all(&self.pool)
        .await?;

        let mut by_user: HashMap<i64, Vec<Role>> = HashMap::new();
        for row in rows {
            by_user.entry(row.user_id).or_default().push(Role {
                id: row.id,
                name: row.name,
                description: row.description,
                permissions: Vec::new(),
            });
        }
        Ok(by_user)
    }

    async fn attach_permissions(&self, roles: &mut [Role]) -> Result<()> {
        if roles.is_empty() {
            return Ok(());
        }
        let role_ids: Vec<i64> = roles.iter().map(|r| r.id).collect();
        let rows = sqlx::query_as::<_, RolePermissionRow>(
            r#"
            SELECT rp.role_id, p.id, p.name, p.description
            FROM role_permissions rp
            JOIN permissions p ON p.id = rp.permission_id
            WHERE rp.role_id = ANY($1)
            ORDER BY p.id
            "#,
        )
        .bind(&role_ids)
        .fetch_all(&self.pool)
        .await?;

        let mut by_role: HashMap<i64, Vec<Permission>> = HashMap::new();
        for row in rows {
            by_role.entry(row.role_id).or_default().push(Permission {
                id: row.id,
                name: row.name,
                description: row.description,
            });
        }
        for role in roles.iter_mut() {
            role.permissions = by_role.remove(&role.id).unwrap_or_default();
        }
        Ok(())
    }

    async fn with_roles(&self, rows: Vec<UserRow>) -> Result<Vec<User>> {
        if rows.is_empty() {
            return Ok(Vec::new());
        }
        let ids: Vec<i64> = rows.iter().map(|r| r.id).collect();
        let mut roles = self.roles_for_users(&ids).await?;
        Ok(rows
            .into_iter()
            .map(|row| {
                let user_roles = roles.remove(&row.id).unwrap_or_default();
                row.with_roles(user_roles)
            })
            .collect())
    }

    async fn link_roles(
        tx: &mut Transaction<'_, Postgres>,
        user_id: i64,
        roles: &[Role],
    ) -> Result<()> {
        if roles.is_empty() {
            return Ok(());
        }
        let role_ids: Vec<i64> = roles.iter().map(|r| r.id).collect();
        sqlx::query(
            r#"
            INSERT INTO user_roles (user_id, role_id)
            SELECT $1, UNNEST($2::bigint[])
            ON CONFLICT DO NOTHING
            "#,
        )
        .bind(user_id)
        .bind(&role_ids)
        .execute(&mut **tx)
        .await?;
        Ok(())
    }
}

#[async_trait]
impl UserRepository for PgUserRepository {
    async fn ping(&self) -> Result<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {} FROM users WHERE email = $1",
            USER_COLUMNS
        ))
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => Ok(self.with_roles(vec![row]).await?.pop()),
            None => Ok(None),
        }
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<User>> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {} FROM users WHERE id = $1",
            USER_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };
        let Some(mut user) = self.with_roles(vec![row]).await?.pop() else {
            return Ok(None);
        };
        self.attach_permissions(&mut user.roles).await?;
        Ok(Some(user))
    }

    async fn find_roles_by_ids(&self, ids: &[i64]) -> Result<Vec<Role>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let roles = sqlx::query_as::<_, Role>(
            "SELECT id, name, description FROM roles WHERE id = ANY($1) ORDER BY id",
        )
        .bind(ids)
        .fetch_all(&self.pool)
        .await?;
        Ok(roles)
    }

    async fn insert(&self, user: NewUser) -> Result<User> {
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query_as::<_, UserRow>(&format!(
            r#"
            INSERT INTO users (name, email, password, faculty, is_active)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING {}
            "#,
            USER_COLUMNS
        ))
        .bind(&user.name)
        .bind(&user.email)
        .bind(&user.password)
        .bind(&user.faculty)
        .bind(user.is_active)
        .fetch_one(&mut *tx)
        .await?;

        Self::link_roles(&mut tx, row.id, &user.roles).await?;
        tx.commit().await?;

        debug!(user_id = row.id, roles = user.roles.len(), "inserted user");
        Ok(row.with_roles(user.roles))
    }

    async fn save(&self, user: &User) -> Result<User> {
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query_as::<_, UserRow>(&format!(
            r#"
            UPDATE users
            SET
                name = $2,
                email = $3,
                password = $4,
                profile_image = $5,
                faculty = $6,
                is_active = $7,
                updated_at = NOW()
            WHERE id = $1
            RETURNING {}
            "#,
            USER_COLUMNS
        ))
        .bind(user.id)
        .bind(&user.name)
        .bind(&user.email)
        .bind(&user.password)
        .bind(&user.profile_image)
        .bind(&user.faculty)
        .bind(user.is_active)
        .fetch_one(&mut *tx)
        .await?;

        sqlx::query("DELETE FROM user_roles WHERE user_id = $1")
            .bind(user.id)
            .execute(&mut *tx)
            .await?;
        Self::link_roles(&mut tx, user.id, &user.roles).await?;

        tx.commit().await?;
        Ok(row.with_roles(user.roles.clone()))
    }

    async fn list(&self, query: &UserQuery) -> Result<(Vec<User>, i64)> {
        let mut filters = Vec::new();
        let mut placeholder = 1;

        if query.role_id.is_some() {
            filters.push(format!(
                "EXISTS (SELECT 1 FROM user_roles ur WHERE ur.user_id = users.id AND ur.role_id = ${})",
                placeholder
            ));
            placeholder += 1;
        }
        if query.faculty.is_some() {
            filters.push(format!("faculty = ${}", placeholder));
            placeholder += 1;
        }

        let where_clause = if filters.is_empty() {
            "".to_string()
        } else {
            format!("WHERE {}", filters.join(" AND "))
        };

        let direction = query.sort_order.keyword();
        let items_query = format!(
            "SELECT {}
             FROM users
             {}
             ORDER BY {} {}, id {}
             LIMIT ${} OFFSET ${}",
            USER_COLUMNS,
            where_clause,
            query.sort_by.column(),
            direction,
            direction,
            placeholder,
            placeholder + 1
        );
        let total_query = format!("SELECT COUNT(*) FROM users {}", where_clause);

        let mut items_statement = sqlx::query_as::<_, UserRow>(&items_query);
        let mut total_statement = sqlx::query_scalar::<_, i64>(&total_query);
        if let Some(role_id) = query.role_id {
            items_statement = items_statement.bind(role_id);
            total_statement = total_statement.bind(role_id);
        }
        if let Some(faculty) = &query.faculty {
            items_statement = items_statement.bind(faculty);
            total_statement = total_statement.bind(faculty);
        }
        items_statement = items_statement.bind(query.limit).bind(query.offset());

        let rows = items_statement.fetch_all(&self.pool).await?;
        let total = total_statement.fetch_one(&self.pool).await?;
        let items = self.with_roles(rows).await?;

        Ok((items, total))
    }
}
